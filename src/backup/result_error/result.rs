use crate::backup::result_error::error::Error;
use crate::backup::result_error::{AddDebugObjectAndFnName, AddFunctionName, AddMsg};
use std::fmt::Debug;

pub type Result<T> = std::result::Result<T, Error>;

impl<S: Into<String>, O: Debug + Send + 'static, R> AddDebugObjectAndFnName<S, O> for Result<R> {
    fn add_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        self.map_err(|e| e.add_debug_object_and_fn_name(obj, fn_name))
    }
}

impl<R, S: Into<String>> AddMsg<S> for Result<R> {
    fn add_msg(self, msg: S) -> Self {
        self.map_err(|e| e.add_msg(msg))
    }
}

impl<R, S: Into<String>> AddFunctionName<S> for Result<R> {
    fn add_fn_name(self, fn_name: S) -> Self {
        self.map_err(|e| e.add_fn_name(fn_name))
    }
}

pub fn convert_error_vec(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_error_vec_empty_is_ok() {
        assert!(convert_error_vec(vec![]).is_ok());
    }

    #[test]
    fn test_convert_error_vec_non_empty_is_err() {
        let errors = vec![
            Error::from(std::io::Error::other("a")),
            Error::from(std::io::Error::other("b")),
        ];
        match convert_error_vec(errors) {
            Err(Error::LotsOfError(v)) => assert_eq!(v.len(), 2),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    fn test_result_add_msg_keeps_ok() {
        let res: Result<u8> = Ok(1);
        assert_eq!(res.add_msg("unused").unwrap(), 1);
    }
}
