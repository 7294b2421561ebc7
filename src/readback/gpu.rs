use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::readback::{
    MappedFrame, ReadbackBackend, ReadbackError, ReadbackRequest, copy_unpadded_rows, packed_len,
};
use std::sync::{Arc, Mutex, PoisonError};

type MapOutcome = Arc<Mutex<Option<Result<(), ::wgpu::BufferAsyncError>>>>;

/// Readback backend for wgpu textures.
///
/// Every request copies the texture into its own `MAP_READ` staging buffer and maps it
/// asynchronously. Completion is observed by polling the device; a forced wait blocks on the
/// device until the map callback fired.
pub struct WgpuReadback {
    device: ::wgpu::Device,
    queue: ::wgpu::Queue,
}

impl WgpuReadback {
    /// Wrap an existing device/queue pair (typically the renderer's own).
    pub fn new(device: ::wgpu::Device, queue: ::wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Create a headless device on the default high-performance adapter.
    pub fn headless() -> FramepipeResult<Self> {
        let instance = ::wgpu::Instance::new(&::wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(
            &::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| FramepipeError::unsupported(format!("no gpu adapter available: {e:?}")))?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&::wgpu::DeviceDescriptor {
                label: Some("framepipe_readback_device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::default(),
                experimental_features: ::wgpu::ExperimentalFeatures::default(),
                memory_hints: ::wgpu::MemoryHints::Performance,
                trace: ::wgpu::Trace::Off,
            }))
            .map_err(|e| FramepipeError::unsupported(format!("wgpu request_device failed: {e:?}")))?;

        Ok(Self::new(device, queue))
    }

    /// The device readbacks are issued on.
    pub fn device(&self) -> &::wgpu::Device {
        &self.device
    }

    /// The queue readbacks are submitted to.
    pub fn queue(&self) -> &::wgpu::Queue {
        &self.queue
    }
}

impl ReadbackBackend for WgpuReadback {
    type Surface = ::wgpu::Texture;
    type Request = WgpuReadbackRequest;

    fn supports_async_readback(&self) -> bool {
        // Buffer mapping is core wgpu functionality on every backend it ships.
        true
    }

    fn request_readback(
        &mut self,
        texture: &::wgpu::Texture,
    ) -> Result<WgpuReadbackRequest, ReadbackError> {
        let format = texture.format();
        if !matches!(
            format,
            ::wgpu::TextureFormat::Rgba8Unorm | ::wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(ReadbackError::new(format!(
                "unsupported texture format {format:?} (expected rgba8)"
            )));
        }
        if !texture.usage().contains(::wgpu::TextureUsages::COPY_SRC) {
            return Err(ReadbackError::new(
                "texture was not created with COPY_SRC usage",
            ));
        }

        let width = texture.width();
        let height = texture.height();
        let row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| ReadbackError::new("texture width overflow"))?;
        let padded_row_bytes = align_to(row_bytes, ::wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let size = u64::from(padded_row_bytes) * u64::from(height);

        let buffer = self.device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("framepipe_readback"),
            size,
            usage: ::wgpu::BufferUsages::MAP_READ | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                label: Some("framepipe_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            ::wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: ::wgpu::Origin3d::ZERO,
                aspect: ::wgpu::TextureAspect::All,
            },
            ::wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: ::wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            ::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let outcome: MapOutcome = Arc::new(Mutex::new(None));
        let callback_outcome = Arc::clone(&outcome);
        buffer
            .slice(..)
            .map_async(::wgpu::MapMode::Read, move |res| {
                *callback_outcome
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(res);
            });

        Ok(WgpuReadbackRequest {
            device: self.device.clone(),
            buffer,
            outcome,
            row_bytes,
            padded_row_bytes,
        })
    }
}

/// Pending readback issued by [`WgpuReadback`].
pub struct WgpuReadbackRequest {
    device: ::wgpu::Device,
    buffer: ::wgpu::Buffer,
    outcome: MapOutcome,
    row_bytes: u32,
    padded_row_bytes: u32,
}

impl WgpuReadbackRequest {
    fn callback_fired(&self) -> bool {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ReadbackRequest for WgpuReadbackRequest {
    type Frame = WgpuFrame;

    fn is_complete(&mut self) -> bool {
        if self.callback_fired() {
            return true;
        }
        if let Err(e) = self.device.poll(::wgpu::PollType::Poll) {
            tracing::debug!(error = ?e, "wgpu poll failed");
        }
        self.callback_fired()
    }

    fn wait(&mut self) {
        if self.callback_fired() {
            return;
        }
        if let Err(e) = self.device.poll(::wgpu::PollType::wait_indefinitely()) {
            tracing::warn!(error = ?e, "wgpu wait failed");
        }
    }

    fn finish(self) -> Result<WgpuFrame, ReadbackError> {
        let outcome = self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match outcome {
            None => Err(ReadbackError::new(
                "readback resolved before its map callback fired",
            )),
            Some(Err(e)) => Err(ReadbackError::new(format!("buffer map failed: {e}"))),
            Some(Ok(())) => Ok(WgpuFrame {
                buffer: self.buffer,
                row_bytes: self.row_bytes as usize,
                padded_row_bytes: self.padded_row_bytes as usize,
            }),
        }
    }
}

/// Mapped staging buffer of a completed [`WgpuReadbackRequest`].
///
/// Rows keep the copy alignment padding until [`MappedFrame::copy_into`] strips it. The buffer
/// is unmapped when the frame is dropped.
pub struct WgpuFrame {
    buffer: ::wgpu::Buffer,
    row_bytes: usize,
    padded_row_bytes: usize,
}

impl MappedFrame for WgpuFrame {
    fn len(&self) -> usize {
        packed_len(
            self.buffer.size() as usize,
            self.row_bytes,
            self.padded_row_bytes,
        )
    }

    fn copy_into(&self, dst: &mut [u8]) {
        let mapped = self.buffer.slice(..).get_mapped_range();
        copy_unpadded_rows(&mapped, self.row_bytes, self.padded_row_bytes, dst);
    }
}

impl Drop for WgpuFrame {
    fn drop(&mut self) {
        self.buffer.unmap();
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
