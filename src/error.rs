use std::fmt::Debug;

/// gfx-hal reports failures through plain `Debug` enums, so they can not be
/// wrapped with `anyhow::Context` directly.
pub trait DebugContext<T> {
    fn debug_context(self, what: &str) -> anyhow::Result<T>;
}

impl<T, E: Debug> DebugContext<T> for Result<T, E> {
    fn debug_context(self, what: &str) -> anyhow::Result<T> {
        self.map_err(|err| anyhow::anyhow!("{}: {:?}", what, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum FakeError {
        OutOfMemory,
    }

    #[test]
    fn ok_passes_through() {
        let res: Result<u32, FakeError> = Ok(3);
        assert_eq!(res.debug_context("never shown").unwrap(), 3);
    }

    #[test]
    fn error_message_names_the_operation() {
        let res: Result<u32, FakeError> = Err(FakeError::OutOfMemory);
        let err = res.debug_context("can't create buffer").unwrap_err();
        assert_eq!(err.to_string(), "can't create buffer: OutOfMemory");
    }
}
