use crate::cull::{CullResult, SceneSetup};
use crate::errors::Result;

use super::StateGuardian;

/// Guardian without a backing device. Every stage succeeds and drawing
/// just counts the items it was handed.
pub struct HeadlessGuardian {}

impl HeadlessGuardian {
    pub fn new() -> Self {
        HeadlessGuardian {}
    }
}

impl StateGuardian for HeadlessGuardian {
    fn begin_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, _: &SceneSetup, result: &CullResult) -> Result<u32> {
        Ok(result.len() as u32)
    }

    fn end_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn flip(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_valid(&self) -> bool {
        true
    }
}
