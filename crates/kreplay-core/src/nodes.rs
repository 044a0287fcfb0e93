use std::collections::HashMap;

/// Dense node ids in first-seen order, valid for one epoch only.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    ids: HashMap<String, u32>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.ids.len() as u32;
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_zero_in_first_seen_order() {
        let mut nodes = NodeRegistry::new();
        assert_eq!(nodes.id_for("worker-b"), 0);
        assert_eq!(nodes.id_for("worker-a"), 1);
        assert_eq!(nodes.id_for("worker-b"), 0);
        assert_eq!(nodes.id_for("worker-c"), 2);
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn fresh_registry_restarts_numbering() {
        let mut first = NodeRegistry::new();
        first.id_for("a");
        first.id_for("b");
        let mut second = NodeRegistry::new();
        assert_eq!(second.id_for("b"), 0);
    }
}
