/// The candidate configurations of one entity.
///
/// Configurations are opaque to the optimizer: each one is addressed by an
/// index in `0..len()` and mapped to a concrete state by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationSpace {
    len: usize,
}

impl ConfigurationSpace {
    pub(crate) fn new(len: usize) -> Self {
        Self { len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, state: usize) -> bool {
        state < self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,                   // Caller-facing label, unique within a system
    pub(crate) space: ConfigurationSpace, // Candidate configurations, fixed once created
}

impl Entity {
    pub(crate) fn new(name: &str, num_configurations: usize) -> Self {
        Self {
            name: name.to_string(),
            space: ConfigurationSpace::new(num_configurations),
        }
    }

    pub fn space(&self) -> ConfigurationSpace {
        self.space
    }

    pub fn num_configurations(&self) -> usize {
        self.space.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_bounds_are_half_open() {
        let space = ConfigurationSpace::new(3);
        assert!(space.contains(0));
        assert!(space.contains(2));
        assert!(!space.contains(3));
        assert_eq!(space.len(), 3);
    }

    #[test]
    fn entity_reports_its_configuration_count() {
        let entity = Entity::new("loop-1", 4);
        assert_eq!(entity.num_configurations(), 4);
        assert_eq!(entity.name, "loop-1");
        assert!(!entity.space().is_empty());
    }
}
