//! Per-target threading model: which named thread culls and which draws.

use std::fmt;
use std::str::FromStr;

use inlinable_string::InlinableString;
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::Result;

use super::errors::Error;

/// The name denoting the calling (application) thread.
pub const CALLING_THREAD: &str = "";

/// Names which thread performs culling and which performs drawing for a
/// render target. The string form is `"cull/draw"`:
///
/// - `""` runs both stages on the calling thread;
/// - `"rdr"` runs both stages on a dedicated thread named `rdr`;
/// - `"cull/draw"` culls on `cull` and draws on `draw`;
/// - `"/draw"` culls on the calling thread and draws on `draw`;
/// - `"rdr/-"` fuses cull and draw into a single pass on `rdr`.
///
/// Targets naming the same thread for a stage share that stage's bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadingModel {
    cull: InlinableString,
    draw: InlinableString,
    fused: bool,
}

impl Default for ThreadingModel {
    fn default() -> Self {
        ThreadingModel {
            cull: InlinableString::from(CALLING_THREAD),
            draw: InlinableString::from(CALLING_THREAD),
            fused: false,
        }
    }
}

impl ThreadingModel {
    /// Parses a threading model from its string form.
    pub fn new(model: &str) -> Result<Self> {
        model.parse()
    }

    /// The name of the thread performing the cull stage.
    #[inline]
    pub fn cull_name(&self) -> &str {
        &self.cull
    }

    /// The name of the thread performing the draw stage.
    #[inline]
    pub fn draw_name(&self) -> &str {
        &self.draw
    }

    /// Returns true if cull and draw are fused into a single pass on the
    /// cull thread, without an intermediate sorted result.
    #[inline]
    pub fn fused(&self) -> bool {
        self.fused
    }

    /// Returns true if the cull stage runs on the calling thread.
    #[inline]
    pub fn cull_on_calling_thread(&self) -> bool {
        self.cull.is_empty()
    }

    /// Returns true if the draw stage runs on the calling thread.
    #[inline]
    pub fn draw_on_calling_thread(&self) -> bool {
        self.draw.is_empty()
    }

    /// Returns true if no dedicated thread is involved at all.
    #[inline]
    pub fn single_threaded(&self) -> bool {
        self.cull.is_empty() && self.draw.is_empty()
    }
}

impl FromStr for ThreadingModel {
    type Err = ::failure::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');
        let cull = parts.next().unwrap_or(CALLING_THREAD);
        let draw = parts.next();

        if parts.next().is_some() {
            return Err(Error::ThreadingModelParseFailure(
                s.into(),
                "more than one '/'".into(),
            )
            .into());
        }

        if cull == "-" {
            return Err(Error::ThreadingModelParseFailure(
                s.into(),
                "'-' names no cull stage".into(),
            )
            .into());
        }

        let (draw, fused) = match draw {
            // A draw name of "-" folds the draw stage into the cull pass.
            Some("-") => (cull, true),
            Some("") | None => (cull, false),
            Some(name) => (name, false),
        };

        Ok(ThreadingModel {
            cull: InlinableString::from(cull),
            draw: InlinableString::from(draw),
            fused,
        })
    }
}

impl fmt::Display for ThreadingModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.fused {
            write!(f, "{}/-", self.cull)
        } else if self.cull == self.draw {
            write!(f, "{}", self.cull)
        } else {
            write!(f, "{}/{}", self.cull, self.draw)
        }
    }
}

impl Serialize for ThreadingModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ThreadingModel {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> ::std::result::Result<Self, D::Error> {
        let v = String::deserialize(deserializer)?;
        v.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_threaded() {
        let model = ThreadingModel::default();
        assert_eq!(model.cull_name(), "");
        assert_eq!(model.draw_name(), "");
        assert!(!model.fused());
        assert!(model.single_threaded());
        assert_eq!(model, "".parse().unwrap());
    }

    #[test]
    fn shared_thread() {
        let model: ThreadingModel = "rdr".parse().unwrap();
        assert_eq!(model.cull_name(), "rdr");
        assert_eq!(model.draw_name(), "rdr");
        assert!(!model.fused());
        assert!(!model.single_threaded());
    }

    #[test]
    fn split_threads() {
        let model: ThreadingModel = "cull/draw".parse().unwrap();
        assert_eq!(model.cull_name(), "cull");
        assert_eq!(model.draw_name(), "draw");
        assert!(!model.fused());

        let model: ThreadingModel = "/draw".parse().unwrap();
        assert!(model.cull_on_calling_thread());
        assert_eq!(model.draw_name(), "draw");
    }

    #[test]
    fn fused() {
        let model: ThreadingModel = "rdr/-".parse().unwrap();
        assert_eq!(model.cull_name(), "rdr");
        assert_eq!(model.draw_name(), "rdr");
        assert!(model.fused());

        let model: ThreadingModel = "/-".parse().unwrap();
        assert!(model.fused());
        assert!(model.single_threaded());
    }

    #[test]
    fn rejects_malformed() {
        assert!("a/b/c".parse::<ThreadingModel>().is_err());
        assert!("-".parse::<ThreadingModel>().is_err());
        assert!("-/draw".parse::<ThreadingModel>().is_err());
    }

    #[test]
    fn round_trips_through_display() {
        for text in &["", "rdr", "cull/draw", "/draw", "rdr/-"] {
            let model: ThreadingModel = text.parse().unwrap();
            let back: ThreadingModel = model.to_string().parse().unwrap();
            assert_eq!(model, back);
        }
    }

    #[test]
    fn serde_as_string() {
        let model: ThreadingModel = "cull/draw".parse().unwrap();
        let json = ::serde_json::to_string(&model).unwrap();
        assert_eq!(json, "\"cull/draw\"");

        let back: ThreadingModel = ::serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
        assert!(::serde_json::from_str::<ThreadingModel>("\"a/b/c\"").is_err());
    }
}
