//! Rigid sublayout units.
//!
//! A unit is a root node plus members whose arrangement was computed by another layout strategy.
//! The simulation only ever moves the root; members are re-derived from the root's frame.

use crate::geometry::Rect;
use crate::model::CNode;
use nalgebra::Vector2;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SublayoutRole {
    Root(usize),
    Member(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrozenMember {
    pub node: usize,
    /// Member center minus root center at freeze time.
    pub offset: Vector2<f64>,
    pub size: Vector2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SublayoutUnit {
    pub root: usize,
    pub root_size: Vector2<f64>,
    pub members: Vec<FrozenMember>,
}

#[derive(Debug, Clone, Default)]
pub struct SublayoutCompositor {
    units: Vec<SublayoutUnit>,
    roles: FxHashMap<usize, SublayoutRole>,
}

impl SublayoutCompositor {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[SublayoutUnit] {
        &self.units
    }

    pub fn role(&self, node: usize) -> Option<SublayoutRole> {
        self.roles.get(&node).copied()
    }

    pub fn is_root(&self, node: usize) -> bool {
        matches!(self.role(node), Some(SublayoutRole::Root(_)))
    }

    pub fn is_member(&self, node: usize) -> bool {
        matches!(self.role(node), Some(SublayoutRole::Member(_)))
    }

    /// Root or member: the node's size is not derived from its children.
    pub fn is_frozen(&self, node: usize) -> bool {
        self.roles.contains_key(&node)
    }

    /// The node that receives forces acting on `node`.
    pub fn body_of(&self, node: usize) -> usize {
        match self.role(node) {
            Some(SublayoutRole::Member(unit)) => self.units[unit].root,
            _ => node,
        }
    }

    /// Records the members' frame relative to `root` as it is right now.
    ///
    /// The root keeps its current size, grown where needed to cover every member.
    ///
    /// Members that already belong to a unit are skipped. When `root` itself is a member of an
    /// existing unit, the new members join that unit instead (nested units flatten into the
    /// outermost one).
    pub fn freeze(&mut self, nodes: &[CNode], root: usize, members: &[usize]) -> usize {
        let unit = match self.role(root) {
            Some(SublayoutRole::Member(outer)) | Some(SublayoutRole::Root(outer)) => outer,
            None => {
                let r = nodes[root].rect;
                self.units.push(SublayoutUnit {
                    root,
                    root_size: Vector2::new(r.width, r.height),
                    members: Vec::new(),
                });
                let unit = self.units.len() - 1;
                self.roles.insert(root, SublayoutRole::Root(unit));
                unit
            }
        };

        let frame_root = self.units[unit].root;
        let origin = center_of(&nodes[frame_root].rect);
        for &m in members {
            if m == frame_root || self.roles.contains_key(&m) {
                continue;
            }
            let r = nodes[m].rect;
            self.units[unit].members.push(FrozenMember {
                node: m,
                offset: center_of(&r) - origin,
                size: Vector2::new(r.width, r.height),
            });
            self.roles.insert(m, SublayoutRole::Member(unit));
        }

        // The root's box must cover its members around its own center.
        let u = &mut self.units[unit];
        for m in &u.members {
            u.root_size.x = u.root_size.x.max(2.0 * (m.offset.x.abs() + m.size.x / 2.0));
            u.root_size.y = u.root_size.y.max(2.0 * (m.offset.y.abs() + m.size.y / 2.0));
        }
        unit
    }

    /// Re-derives every member's absolute box from its root's current position.
    pub fn set_origin(&self, nodes: &mut [CNode]) {
        for unit in &self.units {
            let origin = center_of(&nodes[unit.root].rect);
            nodes[unit.root].rect =
                Rect::from_center(origin.x, origin.y, unit.root_size.x, unit.root_size.y);
            for m in &unit.members {
                let c = origin + m.offset;
                nodes[m.node].rect = Rect::from_center(c.x, c.y, m.size.x, m.size.y);
            }
        }
    }

    /// Carries the units over to another level, translating node indices with `map`.
    ///
    /// Units whose root has no image are dropped; members without an image are left out.
    pub fn remap(&self, map: impl Fn(usize) -> Option<usize>) -> Self {
        let mut out = Self::default();
        for unit in &self.units {
            let Some(root) = map(unit.root) else {
                continue;
            };
            let idx = out.units.len();
            let members: Vec<FrozenMember> = unit
                .members
                .iter()
                .filter_map(|m| {
                    map(m.node).map(|node| FrozenMember {
                        node,
                        offset: m.offset,
                        size: m.size,
                    })
                })
                .collect();
            out.roles.insert(root, SublayoutRole::Root(idx));
            for m in &members {
                out.roles.insert(m.node, SublayoutRole::Member(idx));
            }
            out.units.push(SublayoutUnit {
                root,
                root_size: unit.root_size,
                members,
            });
        }
        out
    }
}

fn center_of(r: &Rect) -> Vector2<f64> {
    Vector2::new(r.center_x(), r.center_y())
}
