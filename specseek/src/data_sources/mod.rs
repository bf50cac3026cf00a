pub mod dataset;
pub mod delimited;
pub mod labfile;
