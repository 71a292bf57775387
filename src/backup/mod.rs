pub mod archive;
pub mod backup_config;
pub mod filter;
pub mod job;
pub mod replicate;
pub mod result_error;
pub mod schedule;
pub mod scheduler;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
