use std::ptr;

/// Grow-only byte store holding the root's composited image between calls.
#[derive(Clone, Debug, Default)]
pub struct ResultBuffer {
    bytes: Vec<u8>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow to at least `n` bytes. Never shrinks.
    pub fn ensure_capacity(&mut self, n: usize) {
        if self.bytes.len() < n {
            self.bytes.resize(n, 0);
        }
    }

    /// Overwrite the first `src.len()` bytes, growing first if needed.
    pub fn write(&mut self, src: &[u8]) {
        self.ensure_capacity(src.len());
        self.bytes[..src.len()].copy_from_slice(src);
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn view(&self, len: usize) -> ResultView<'_> {
        ResultView {
            bytes: self.bytes.get(..len),
        }
    }
}

/// Borrowed view of a composite result.
///
/// On the root rank it covers exactly `width * height * 4` RGBA8 bytes. The borrow ties it to
/// the context, so it cannot outlive the next composite call or the context itself; copy with
/// [`ResultView::to_vec`] to keep the pixels longer. Non-root ranks get an empty view.
#[derive(Clone, Copy, Debug)]
pub struct ResultView<'a> {
    bytes: Option<&'a [u8]>,
}

impl<'a> ResultView<'a> {
    pub fn empty() -> Self {
        Self { bytes: None }
    }

    pub fn len(&self) -> usize {
        self.bytes.map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Composited bytes; empty on non-root ranks.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes.unwrap_or(&[])
    }

    /// Start of the bytes for handing across a foreign boundary; null when empty.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.map_or(ptr::null(), <[u8]>::as_ptr)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/result.rs"]
mod tests;
