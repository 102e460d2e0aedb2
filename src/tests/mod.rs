mod synthetic;
mod dex_container;
