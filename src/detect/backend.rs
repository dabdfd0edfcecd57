use anyhow::Result;

use crate::detect::result::Observation;
use crate::frame::FrameView;

/// Model runtime trait.
///
/// Takes one validated frame and returns every region the model reports,
/// with all label candidates attached. Label resolution and filtering happen
/// later, when the overlay is built.
pub trait ModelRuntime: Send {
    /// Runtime identifier, used for registry lookup.
    fn name(&self) -> &'static str;

    /// Run the model on a frame.
    ///
    /// Boxes must be normalized to the frame with a bottom-left origin.
    fn infer(&mut self, frame: &FrameView<'_>) -> Result<Vec<Observation>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
