//! Static vertex attribute buffers.

use crate::error::{BufferSizeMismatchError, HarnessError};
use crate::gpu::{
    float_bytes, AttributeLocation, BufferHandle, BufferTarget, GpuResult, GraphicsContext,
    UsageHint,
};

/// A GPU buffer of `item_count` vertices with `item_size` `f32` components each.
///
/// The contents are uploaded once at creation and never change.
#[derive(Debug)]
pub struct GeometryBuffer {
    handle: BufferHandle,
    item_size: u32,
    item_count: u32,
}

impl GeometryBuffer {
    /// Uploads `data` into a new static buffer.
    ///
    /// The length of `data` is checked before anything is allocated, so a mismatch leaves
    /// the context untouched. The array bind point is cleared again before returning.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidItemSize`] if `item_size` is not 1..=4.
    /// - [`HarnessError::BufferSizeMismatch`] if `data.len() != item_size * item_count`.
    /// - [`HarnessError::GpuState`] if the context rejects an upload call.
    pub fn create<C: GraphicsContext + ?Sized>(
        ctx: &mut C,
        item_size: u32,
        item_count: u32,
        data: &[f32],
    ) -> Result<Self, HarnessError> {
        if !(1..=4).contains(&item_size) {
            return Err(HarnessError::InvalidItemSize(item_size));
        }
        let expected = item_size as usize * item_count as usize;
        if data.len() != expected {
            return Err(BufferSizeMismatchError {
                item_size,
                item_count,
                expected,
                actual: data.len(),
            }
            .into());
        }

        let handle = ctx.create_buffer()?;
        ctx.bind_buffer(BufferTarget::Array, Some(handle))?;
        ctx.upload_data(BufferTarget::Array, float_bytes(data), UsageHint::Static)?;
        ctx.bind_buffer(BufferTarget::Array, None)?;

        log::debug!("uploaded {item_count} x {item_size} floats into {handle:?}");

        Ok(Self {
            handle,
            item_size,
            item_count,
        })
    }

    /// Binds the buffer and points `location` of the active program at it.
    ///
    /// Leaves the buffer bound to [`BufferTarget::Array`]; bind state is global, so the
    /// next buffer must be bound again before its own attribute is declared.
    pub fn bind_for_attribute<C: GraphicsContext + ?Sized>(
        &self,
        ctx: &mut C,
        location: AttributeLocation,
    ) -> GpuResult<()> {
        ctx.bind_buffer(BufferTarget::Array, Some(self.handle))?;
        ctx.attribute_pointer(location, self.item_size)
    }

    /// Releases the GPU buffer.
    pub fn delete<C: GraphicsContext + ?Sized>(self, ctx: &mut C) -> GpuResult<()> {
        ctx.delete_buffer(self.handle)
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn item_size(&self) -> u32 {
        self.item_size
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{Command, HeadlessContext};

    #[test]
    fn mismatched_length_allocates_nothing() {
        let mut ctx = HeadlessContext::new(1280, 720);
        let err = GeometryBuffer::create(&mut ctx, 3, 3, &[0.0; 8]).unwrap_err();

        match err {
            HarnessError::BufferSizeMismatch(mismatch) => {
                assert_eq!(mismatch.expected, 9);
                assert_eq!(mismatch.actual, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn invalid_item_size_is_rejected() {
        let mut ctx = HeadlessContext::new(1280, 720);
        assert!(matches!(
            GeometryBuffer::create(&mut ctx, 5, 1, &[0.0; 5]),
            Err(HarnessError::InvalidItemSize(5))
        ));
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn create_uploads_static_and_unbinds() {
        let mut ctx = HeadlessContext::new(1280, 720);
        let data = [0.0, 1.0, 0.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
        let buffer = GeometryBuffer::create(&mut ctx, 3, 3, &data).unwrap();

        assert_eq!(buffer.item_size(), 3);
        assert_eq!(buffer.item_count(), 3);
        assert_eq!(ctx.buffer_data(buffer.handle()), Some(float_bytes(&data)));
        assert_eq!(
            ctx.commands(),
            &[
                Command::CreateBuffer(buffer.handle()),
                Command::BindBuffer(BufferTarget::Array, Some(buffer.handle())),
                Command::UploadData {
                    buffer: buffer.handle(),
                    byte_len: 36,
                    usage: UsageHint::Static,
                },
                Command::BindBuffer(BufferTarget::Array, None),
            ]
        );
    }

    #[test]
    fn bind_for_attribute_declares_item_size() {
        let mut ctx = HeadlessContext::new(1280, 720);
        let buffer = GeometryBuffer::create(&mut ctx, 4, 1, &[1.0, 0.0, 0.0, 1.0]).unwrap();
        ctx.take_commands();

        buffer
            .bind_for_attribute(&mut ctx, AttributeLocation(1))
            .unwrap();
        assert_eq!(
            ctx.commands().last(),
            Some(&Command::AttributePointer {
                location: AttributeLocation(1),
                buffer: buffer.handle(),
                components: 4,
            })
        );
    }
}
