//! The resolve pass run by `Model::finalize`.
//!
//! Checks that every socket points at a frame and computes the ground pose
//! of every frame with all joints at their default coordinates.

use std::collections::{HashMap, HashSet};

use nalgebra::Isometry3;

use crate::component::{Component, ComponentKind};
use crate::error::{ModelError, Result};

/// Derived state rebuilt by `finalize`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Resolved {
    /// Ground pose of every frame, keyed by absolute path.
    pub poses: HashMap<String, Isometry3<f64>>,
}

enum FrameNode<'a> {
    Ground,
    Body,
    Offset {
        parent: &'a str,
        transform: Isometry3<f64>,
    },
}

struct Resolver<'a> {
    frames: HashMap<&'a str, FrameNode<'a>>,
    joints: Vec<(&'a str, &'a str)>,
    body_poses: HashMap<String, Isometry3<f64>>,
    visiting: HashSet<String>,
}

impl<'a> Resolver<'a> {
    /// Follows offset frames down to the ground or body they sit on.
    ///
    /// Returns the base path and the frame's transform in the base.
    fn base_of(&self, path: &'a str) -> Result<(&'a str, Isometry3<f64>)> {
        let mut current = path;
        let mut in_base = Isometry3::identity();
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return Err(ModelError::FrameCycle(path.to_string()));
            }
            match self.frames.get(current) {
                Some(FrameNode::Offset { parent, transform }) => {
                    in_base = transform * in_base;
                    current = *parent;
                }
                Some(FrameNode::Ground | FrameNode::Body) => return Ok((current, in_base)),
                None => return Err(ModelError::ComponentNotFound(current.to_string())),
            }
        }
    }

    fn frame_pose(&mut self, path: &'a str) -> Result<Isometry3<f64>> {
        let (base, in_base) = self.base_of(path)?;
        if matches!(self.frames.get(base), Some(FrameNode::Body)) {
            Ok(self.body_pose(base)? * in_base)
        } else {
            Ok(in_base)
        }
    }

    fn body_pose(&mut self, body: &'a str) -> Result<Isometry3<f64>> {
        if let Some(pose) = self.body_poses.get(body) {
            return Ok(*pose);
        }
        if !self.visiting.insert(body.to_string()) {
            return Err(ModelError::FrameCycle(body.to_string()));
        }

        let mut pose = Isometry3::identity();
        for (parent, child) in self.joints.clone() {
            let (child_base, child_in_body) = self.base_of(child)?;
            if child_base == body {
                pose = self.frame_pose(parent)? * child_in_body.inverse();
                break;
            }
        }

        self.visiting.remove(body);
        self.body_poses.insert(body.to_string(), pose);
        Ok(pose)
    }
}

/// Runs the resolve pass over the flattened component list.
pub(crate) fn resolve(components: &[(String, &Component)]) -> Result<Resolved> {
    let mut frames = HashMap::new();
    let mut joints = Vec::new();
    for (path, component) in components {
        let node = match &component.kind {
            ComponentKind::Ground => FrameNode::Ground,
            ComponentKind::Body(_) => FrameNode::Body,
            ComponentKind::OffsetFrame(frame) => FrameNode::Offset {
                parent: frame.parent.as_str(),
                transform: frame.transform(),
            },
            ComponentKind::Joint(joint) => {
                joints.push((joint.parent_frame.as_str(), joint.child_frame.as_str()));
                continue;
            }
            _ => continue,
        };
        frames.insert(path.as_str(), node);
    }

    for (path, component) in components {
        for (socket, target) in component.kind.sockets() {
            if !frames.contains_key(target) {
                return Err(ModelError::UnresolvedSocket {
                    component: path.clone(),
                    socket,
                    target: target.to_string(),
                });
            }
        }
    }

    let mut resolver = Resolver {
        frames,
        joints,
        body_poses: HashMap::new(),
        visiting: HashSet::new(),
    };

    let frame_paths: Vec<&str> = resolver.frames.keys().copied().collect();
    let mut poses = HashMap::with_capacity(frame_paths.len());
    for path in frame_paths {
        poses.insert(path.to_string(), resolver.frame_pose(path)?);
    }
    Ok(Resolved { poses })
}
