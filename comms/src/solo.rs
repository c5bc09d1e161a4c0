use super::Collective;

/// A group with a single member, every reduction is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoloGroup;

impl SoloGroup {
    /// Creates a new `SoloGroup`.
    pub fn new() -> Self {
        Self
    }
}

impl Collective for SoloGroup {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&mut self, _buf: &mut [f64]) -> crate::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_is_the_identity() {
        let mut group = SoloGroup::new();
        let mut buf = [1.5, -2.0, 3.25];

        group.all_reduce_sum(&mut buf).unwrap();

        assert_eq!(buf, [1.5, -2.0, 3.25]);
        assert!(group.is_root());
        assert_eq!(group.size(), 1);
    }
}
