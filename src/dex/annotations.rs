//! DEX annotations-related structures and I/O
//!
//! Binary structures of the DEX format:
//! - annotations_directory_item
//! - annotation_set_item
//! - annotation_set_ref_list
//! - annotation_item (wraps EncodedAnnotation)

use serde::Serialize;

use crate::dex::cursor::ByteCursor;
use crate::dex::encoded_values::EncodedAnnotation;
use crate::dex::error::DexError;
use crate::dex::{write_u1, write_u4};

/// Annotation visibility as stored in `annotation_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Build,
    Runtime,
    System,
    Unknown(u8),
}

impl From<u8> for Visibility {
    fn from(v: u8) -> Self {
        match v {
            0x00 => Visibility::Build,
            0x01 => Visibility::Runtime,
            0x02 => Visibility::System,
            other => Visibility::Unknown(other),
        }
    }
}

/// annotation_item
/// https://source.android.com/docs/core/runtime/dex-format#annotation-item
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationItem {
    /// Visibility: 0x00 = build, 0x01 = runtime, 0x02 = system
    pub visibility: u8,
    /// The encoded annotation payload
    pub annotation: EncodedAnnotation,
}

impl AnnotationItem {
    pub fn read(cur: &mut ByteCursor) -> Result<AnnotationItem, DexError> {
        let visibility = cur.read_u8()?;
        let annotation = EncodedAnnotation::read(cur)?;
        Ok(AnnotationItem {
            visibility,
            annotation,
        })
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from(self.visibility)
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u1(bytes, self.visibility);
        c += self.annotation.write(bytes);
        c
    }
}

/// annotation_set_item
/// A list of offsets to `annotation_item`s
/// https://source.android.com/docs/core/runtime/dex-format#annotation-set-item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSetItem {
    /// Offsets (from start of the file) to `annotation_item`s
    pub entries: Vec<u32>,
}

impl AnnotationSetItem {
    pub fn read(cur: &mut ByteCursor) -> Result<AnnotationSetItem, DexError> {
        let size = cur.read_u32()? as usize;
        let mut entries = Vec::with_capacity(size.min(cur.remaining_len() / 4));
        for _ in 0..size {
            entries.push(cur.read_u32()?);
        }
        Ok(AnnotationSetItem { entries })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.entries.len() as u32);
        for off in &self.entries {
            c += write_u4(bytes, *off);
        }
        c
    }
}

/// annotation_set_ref_list
/// A list of offsets to `annotation_set_item`s
/// https://source.android.com/docs/core/runtime/dex-format#annotation-set-ref-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSetRefList {
    pub list: Vec<u32>,
}

impl AnnotationSetRefList {
    pub fn read(cur: &mut ByteCursor) -> Result<AnnotationSetRefList, DexError> {
        let size = cur.read_u32()? as usize;
        let mut list = Vec::with_capacity(size.min(cur.remaining_len() / 4));
        for _ in 0..size {
            list.push(cur.read_u32()?);
        }
        Ok(AnnotationSetRefList { list })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.list.len() as u32);
        for off in &self.list {
            c += write_u4(bytes, *off);
        }
        c
    }
}

/// field_annotations_item
/// https://source.android.com/docs/core/runtime/dex-format#field-annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAnnotations {
    /// index into field_ids
    pub field_idx: u32,
    /// offset to an `annotation_set_item`
    pub annotations_off: u32,
}

impl FieldAnnotations {
    pub fn read(cur: &mut ByteCursor) -> Result<FieldAnnotations, DexError> {
        Ok(FieldAnnotations {
            field_idx: cur.read_u32()?,
            annotations_off: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.field_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// method_annotations_item
/// https://source.android.com/docs/core/runtime/dex-format#method-annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAnnotations {
    /// index into method_ids
    pub method_idx: u32,
    /// offset to an `annotation_set_item`
    pub annotations_off: u32,
}

impl MethodAnnotations {
    pub fn read(cur: &mut ByteCursor) -> Result<MethodAnnotations, DexError> {
        Ok(MethodAnnotations {
            method_idx: cur.read_u32()?,
            annotations_off: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.method_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// parameter_annotations_item
/// https://source.android.com/docs/core/runtime/dex-format#parameter-annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAnnotations {
    /// index into method_ids (method whose parameters are being annotated)
    pub method_idx: u32,
    /// offset to an `annotation_set_ref_list`
    pub annotations_off: u32,
}

impl ParameterAnnotations {
    pub fn read(cur: &mut ByteCursor) -> Result<ParameterAnnotations, DexError> {
        Ok(ParameterAnnotations {
            method_idx: cur.read_u32()?,
            annotations_off: cur.read_u32()?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.method_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// annotations_directory_item
/// https://source.android.com/docs/core/runtime/dex-format#annotations-directory-item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationsDirectoryItem {
    /// Offset to the class `annotation_set_item` (or 0 if none)
    pub class_annotations_off: u32,
    pub field_annotations: Vec<FieldAnnotations>,
    pub method_annotations: Vec<MethodAnnotations>,
    pub parameter_annotations: Vec<ParameterAnnotations>,
}

impl AnnotationsDirectoryItem {
    pub fn read(cur: &mut ByteCursor) -> Result<AnnotationsDirectoryItem, DexError> {
        let class_annotations_off = cur.read_u32()?;
        let fields_size = cur.read_u32()? as usize;
        let annotated_methods_size = cur.read_u32()? as usize;
        let annotated_parameters_size = cur.read_u32()? as usize;

        let mut field_annotations = Vec::with_capacity(fields_size.min(cur.remaining_len() / 8));
        for _ in 0..fields_size {
            field_annotations.push(FieldAnnotations::read(cur)?);
        }

        let mut method_annotations = Vec::with_capacity(annotated_methods_size.min(cur.remaining_len() / 8));
        for _ in 0..annotated_methods_size {
            method_annotations.push(MethodAnnotations::read(cur)?);
        }

        let mut parameter_annotations = Vec::with_capacity(annotated_parameters_size.min(cur.remaining_len() / 8));
        for _ in 0..annotated_parameters_size {
            parameter_annotations.push(ParameterAnnotations::read(cur)?);
        }

        Ok(AnnotationsDirectoryItem {
            class_annotations_off,
            field_annotations,
            method_annotations,
            parameter_annotations,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.class_annotations_off);
        c += write_u4(bytes, self.field_annotations.len() as u32);
        c += write_u4(bytes, self.method_annotations.len() as u32);
        c += write_u4(bytes, self.parameter_annotations.len() as u32);

        for fa in &self.field_annotations {
            c += fa.write(bytes);
        }
        for ma in &self.method_annotations {
            c += ma.write(bytes);
        }
        for pa in &self.parameter_annotations {
            c += pa.write(bytes);
        }
        c
    }
}
