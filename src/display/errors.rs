use super::region::RegionHandle;
use super::target::TargetHandle;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Graphics device was lost.")]
    DeviceLost,
    #[fail(display = "Backend: {}", _0)]
    Backend(String),
    #[fail(display = "Can not parse threading model from str '{}': {}", _0, _1)]
    ThreadingModelParseFailure(String, String),
    #[fail(display = "{} is invalid.", _0)]
    TargetHandleInvalid(TargetHandle),
    #[fail(display = "{} is invalid.", _0)]
    RegionHandleInvalid(RegionHandle),
    #[fail(display = "Target is not drawn by the calling thread.")]
    NotCallingThread,
}

pub type Result<T> = ::std::result::Result<T, Error>;
