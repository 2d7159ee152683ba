use std::collections::HashMap;

use glam::Mat4;

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    pub name: String,
    pub bind_local: Mat4,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Node hierarchy stored as one arena. The root is index 0 and every node is
/// stored after its parent, so walking the arena in order visits parents first.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    nodes: Vec<SkeletonNode>,
    bone_offsets: Vec<Mat4>,
    bone_names: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new(root_name: impl Into<String>, root_bind: Mat4) -> Self {
        Self {
            nodes: vec![SkeletonNode {
                name: root_name.into(),
                bind_local: root_bind,
                parent: None,
                children: Vec::new(),
            }],
            bone_offsets: Vec::new(),
            bone_names: HashMap::new(),
        }
    }

    /// Appends a child of `parent`. Returns `None` when `parent` does not exist.
    pub fn add_node(
        &mut self,
        parent: usize,
        name: impl Into<String>,
        bind_local: Mat4,
    ) -> Option<usize> {
        if parent >= self.nodes.len() {
            return None;
        }
        let index = self.nodes.len();
        self.nodes.push(SkeletonNode {
            name: name.into(),
            bind_local,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        Some(index)
    }

    /// Registers `name` as the next bone with its inverse-bind `offset`. Bone
    /// indices are dense in registration order; re-registering a name keeps its
    /// index and replaces the offset.
    pub fn add_bone(&mut self, name: impl Into<String>, offset: Mat4) -> usize {
        let name = name.into();
        if let Some(&index) = self.bone_names.get(&name) {
            self.bone_offsets[index] = offset;
            return index;
        }
        let index = self.bone_offsets.len();
        self.bone_offsets.push(offset);
        self.bone_names.insert(name, index);
        index
    }

    pub fn nodes(&self) -> &[SkeletonNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&SkeletonNode> {
        self.nodes.get(index)
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn bone_count(&self) -> usize {
        self.bone_offsets.len()
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    pub fn bone_offset(&self, bone: usize) -> Option<Mat4> {
        self.bone_offsets.get(bone).copied()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn children_follow_parents_in_arena() {
        let mut skeleton = Skeleton::new("root", Mat4::IDENTITY);
        let hip = skeleton
            .add_node(0, "hip", Mat4::from_translation(Vec3::Y))
            .expect("hip");
        let knee = skeleton
            .add_node(hip, "knee", Mat4::IDENTITY)
            .expect("knee");

        assert!(skeleton.add_node(42, "orphan", Mat4::IDENTITY).is_none());
        assert_eq!(skeleton.nodes()[0].children, vec![hip]);
        assert_eq!(skeleton.node(knee).and_then(|node| node.parent), Some(hip));
        assert_eq!(skeleton.node_index("knee"), Some(knee));
    }

    #[test]
    fn bone_indices_are_dense_and_stable() {
        let mut skeleton = Skeleton::new("root", Mat4::IDENTITY);
        assert_eq!(skeleton.add_bone("hip", Mat4::IDENTITY), 0);
        assert_eq!(skeleton.add_bone("knee", Mat4::IDENTITY), 1);
        let shifted = Mat4::from_translation(Vec3::X);
        assert_eq!(skeleton.add_bone("hip", shifted), 0);

        assert_eq!(skeleton.bone_count(), 2);
        assert_eq!(skeleton.bone_offset(0), Some(shifted));
        assert_eq!(skeleton.bone_index("ankle"), None);
    }
}
