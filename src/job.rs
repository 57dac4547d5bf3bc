//! Job submission parameters and the fields the server echoes back.

use serde::{Deserialize, Serialize};

/// Engine identifier the farm uses for Eevee, which it only renders on GPU.
pub const EEVEE_ENGINE: &str = "BLENDER_EEVEE";

/// What to render: a frame range or one still frame.
///
/// A still frame goes over the wire as a degenerate one-frame animation:
/// `start_frame` carries the frame, `end_frame` stays 0 and `step_frame` 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Animation { start: i32, end: i32, step: i32 },
    SingleFrame { frame: i32 },
}

impl JobKind {
    pub fn type_field(&self) -> &'static str {
        match self {
            Self::Animation { .. } => "animation",
            Self::SingleFrame { .. } => "singleframe",
        }
    }

    /// The `(start_frame, end_frame, step_frame)` triple for the wire.
    pub fn frame_range(&self) -> (i32, i32, i32) {
        match *self {
            Self::Animation { start, end, step } => (start, end, step),
            Self::SingleFrame { frame } => (frame, 0, 1),
        }
    }
}

/// Devices the farm's clients may render the job on. Only meaningful for
/// Cycles; flags are summed into a bitmask, not exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputeMethod {
    pub cpu: bool,
    pub cuda: bool,
    pub opencl: bool,
}

impl ComputeMethod {
    /// CPU=1, CUDA=2, OpenCL=4.
    pub fn bitmask(&self) -> u32 {
        let mut mask = 0;
        if self.cpu {
            mask += 1;
        }
        if self.cuda {
            mask += 2;
        }
        if self.opencl {
            mask += 4;
        }
        mask
    }

    /// Applies the engine-specific constraint: Eevee jobs never render on
    /// CPU, whatever the caller asked for.
    pub fn for_engine(mut self, engine: &str) -> Self {
        if engine == EEVEE_ENGINE {
            self.cpu = false;
        }
        self
    }
}

/// Caller-chosen half of a job submission. The other half comes from the
/// step-2 page, see [`JobPage`].
#[derive(Clone, Debug)]
pub struct JobOptions {
    pub kind: JobKind,
    pub compute: ComputeMethod,
    /// Whether other members may watch the render.
    pub public: bool,
    /// Ask the farm to assemble an mp4 from the frames.
    pub mp4: bool,
    /// How many parts each frame is split into.
    pub split_tiles: String,
}

/// The fields the step-2 page echoes back about the uploaded archive. These
/// are forwarded to the submission POST verbatim; the client never fills in
/// values of its own when the server supplied one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPage {
    pub engine: String,
    pub archive: String,
    pub path: String,
    pub framerate: String,
    pub cycles_samples: String,
    pub samples_pixel: String,
    pub image_extension: String,
}

impl JobPage {
    /// Maps a step-2 input id to the field it fills.
    pub(crate) fn slot_mut(&mut self, id: &str) -> Option<&mut String> {
        match id {
            "addjob_engine_0" => Some(&mut self.engine),
            "addjob_archive_0" => Some(&mut self.archive),
            "addjob_path_0" => Some(&mut self.path),
            "addjob_framerate_0" => Some(&mut self.framerate),
            "addjob_cycles_samples_0" => Some(&mut self.cycles_samples),
            "addjob_samples_pixel_0" => Some(&mut self.samples_pixel),
            "addjob_image_extension_0" => Some(&mut self.image_extension),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmask_combinations() {
        let m = |cpu, cuda, opencl| ComputeMethod { cpu, cuda, opencl }.bitmask();
        assert_eq!(m(false, false, false), 0);
        assert_eq!(m(true, false, false), 1);
        assert_eq!(m(false, true, false), 2);
        assert_eq!(m(true, true, false), 3);
        assert_eq!(m(false, false, true), 4);
        assert_eq!(m(true, true, true), 7);
    }

    #[test]
    fn eevee_forces_cpu_off() {
        let requested = ComputeMethod {
            cpu: true,
            cuda: true,
            opencl: false,
        };
        assert_eq!(requested.for_engine(EEVEE_ENGINE).bitmask(), 2);
        assert_eq!(requested.for_engine("CYCLES").bitmask(), 3);
    }

    #[test]
    fn animation_frame_range() {
        let kind = JobKind::Animation {
            start: 1,
            end: 250,
            step: 2,
        };
        assert_eq!(kind.type_field(), "animation");
        assert_eq!(kind.frame_range(), (1, 250, 2));
    }

    #[test]
    fn still_frame_is_a_one_frame_animation() {
        let kind = JobKind::SingleFrame { frame: 42 };
        assert_eq!(kind.type_field(), "singleframe");
        assert_eq!(kind.frame_range(), (42, 0, 1));
    }
}
