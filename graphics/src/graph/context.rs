//! Command recording context passed to render passes.

use crate::backend::{BackendError, Command, Device, GpuResource};
use crate::types::ClearValue;

/// Records GPU commands for a frame and gives access to the device.
///
/// Commands are buffered until [`flush`](Self::flush). Work recorded by
/// passes that ran before a failing pass stays in the buffer; the caller
/// decides whether to submit it.
pub struct RenderContext<'a> {
    device: &'a mut dyn Device,
    commands: Vec<Command>,
}

impl<'a> RenderContext<'a> {
    /// Create a context recording for `device`.
    pub fn new(device: &'a mut dyn Device) -> Self {
        Self {
            device,
            commands: Vec::new(),
        }
    }

    /// The underlying device.
    pub fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }

    /// Open a debug scope.
    pub fn begin_pass(&mut self, name: &str) {
        self.commands.push(Command::BeginPass(name.to_owned()));
    }

    /// Close the innermost debug scope.
    pub fn end_pass(&mut self) {
        self.commands.push(Command::EndPass);
    }

    pub fn clear(&mut self, target: &GpuResource, value: ClearValue) {
        self.commands.push(Command::Clear {
            target: target.id(),
            value,
        });
    }

    pub fn copy(&mut self, src: &GpuResource, dst: &GpuResource) {
        self.commands.push(Command::Copy {
            src: src.id(),
            dst: dst.id(),
        });
    }

    /// Record a raster draw.
    pub fn draw(&mut self, label: &str, inputs: &[&GpuResource], targets: &[&GpuResource]) {
        self.commands.push(Command::Draw {
            label: label.to_owned(),
            inputs: inputs.iter().map(|r| r.id()).collect(),
            targets: targets.iter().map(|r| r.id()).collect(),
        });
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, label: &str, groups: [u32; 3], resources: &[&GpuResource]) {
        self.commands.push(Command::Dispatch {
            label: label.to_owned(),
            groups,
            resources: resources.iter().map(|r| r.id()).collect(),
        });
    }

    /// Commands recorded since the last flush.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Submit the recorded commands to the device.
    pub fn flush(&mut self) -> Result<(), BackendError> {
        if self.commands.is_empty() {
            return Ok(());
        }
        let commands = std::mem::take(&mut self.commands);
        self.device.submit(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::types::{BindFlags, ResourceDesc, ResourceFormat};

    #[test]
    fn test_record_and_flush() {
        let mut device = DummyDevice::new();
        let target = device
            .create_resource(&ResourceDesc::texture_2d(
                8,
                8,
                ResourceFormat::Rgba8Unorm,
                BindFlags::RENDER_TARGET,
            ))
            .unwrap();

        {
            let mut ctx = RenderContext::new(&mut device);
            ctx.begin_pass("clear");
            ctx.clear(&target, ClearValue::color(0.0, 0.0, 0.0, 1.0));
            ctx.end_pass();
            assert_eq!(ctx.commands().len(), 3);
            ctx.flush().unwrap();
            assert!(ctx.commands().is_empty());
        }

        assert_eq!(device.submitted_commands().len(), 3);
        assert_eq!(
            device.submitted_commands()[1],
            Command::Clear {
                target: target.id(),
                value: ClearValue::color(0.0, 0.0, 0.0, 1.0)
            }
        );
    }
}
