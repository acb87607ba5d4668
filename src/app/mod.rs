pub mod extract_use_case;
pub mod load_use_case;
pub mod ports;
