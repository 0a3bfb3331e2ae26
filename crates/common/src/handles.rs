use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// A GPU buffer (vertex or uniform).
    BufferHandle
);
handle!(
    /// A bind group binding one uniform buffer.
    BindGroupHandle
);
handle!(BindGroupLayoutHandle);
handle!(
    /// A render pipeline compiled for one color format.
    PipelineHandle
);
handle!(
    /// A texture together with its default view.
    TextureHandle
);

/// Mints unique raw handle values for one backend.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn buffer(&self) -> BufferHandle {
        BufferHandle(self.next_raw())
    }

    pub fn bind_group(&self) -> BindGroupHandle {
        BindGroupHandle(self.next_raw())
    }

    pub fn layout(&self) -> BindGroupLayoutHandle {
        BindGroupLayoutHandle(self.next_raw())
    }

    pub fn pipeline(&self) -> PipelineHandle {
        PipelineHandle(self.next_raw())
    }

    pub fn texture(&self) -> TextureHandle {
        TextureHandle(self.next_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_repeats() {
        let alloc = HandleAllocator::new();
        let a = alloc.buffer();
        let b = alloc.bind_group();
        let c = alloc.buffer();
        assert_ne!(a.0, b.0);
        assert_ne!(a, c);
    }

    #[test]
    fn handle_display_names_kind() {
        assert_eq!(BufferHandle(7).to_string(), "BufferHandle#7");
    }
}
