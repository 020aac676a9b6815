pub mod format;
pub mod net;

pub use format::{format_file_size, format_str, get_number_format, parse_json, stringify, to_upper_case};
pub use net::{is_cellular_network, is_net_available};
