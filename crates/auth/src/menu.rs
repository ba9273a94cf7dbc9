//! Per-role menu composition.
//!
//! Menu items form a tree through an optional parent reference. Composition
//! indexes visible items by parent id and then builds owned [`MenuNode`]
//! values top-down from the roots, so the output can never contain a cycle
//! even if the stored parent pointers do.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use lexdesk_core::{MenuItemId, RoleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub path: String,
    pub label: String,
    pub icon: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub parent_id: Option<MenuItemId>,
}

/// Explicit per-role visibility for one menu item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPermission {
    pub role_id: RoleId,
    pub menu_item_id: MenuItemId,
    pub visible: bool,
}

/// How visibility is resolved for the role being rendered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MenuAccess {
    /// The role holds the wildcard permission: every active item is visible.
    All,
    /// Visibility comes from the role's `MenuPermission` rows; a missing row
    /// means hidden.
    Role(RoleId),
}

/// A rendered menu node, as consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    pub id: MenuItemId,
    pub path: String,
    pub label: String,
    pub icon: String,
    pub sort_order: i32,
    pub children: Vec<MenuNode>,
}

/// Compose the visible menu tree for `access`.
///
/// Pure: the same inputs always produce the same tree in the same order.
/// Siblings are ordered by `sort_order`, then by id.
pub fn menu_for(items: &[MenuItem], grants: &[MenuPermission], access: MenuAccess) -> Vec<MenuNode> {
    let explicit: HashMap<MenuItemId, bool> = match access {
        MenuAccess::All => HashMap::new(),
        MenuAccess::Role(role_id) => grants
            .iter()
            .filter(|g| g.role_id == role_id)
            .map(|g| (g.menu_item_id, g.visible))
            .collect(),
    };

    let is_visible = |item: &MenuItem| {
        item.is_active
            && match access {
                MenuAccess::All => true,
                MenuAccess::Role(_) => explicit.get(&item.id).copied().unwrap_or(false),
            }
    };

    let mut by_parent: HashMap<Option<MenuItemId>, Vec<&MenuItem>> = HashMap::new();
    for item in items.iter().filter(|i| is_visible(*i)) {
        by_parent.entry(item.parent_id).or_default().push(item);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
    }

    build_level(None, &by_parent)
}

fn build_level(
    parent: Option<MenuItemId>,
    by_parent: &HashMap<Option<MenuItemId>, Vec<&MenuItem>>,
) -> Vec<MenuNode> {
    let Some(siblings) = by_parent.get(&parent) else {
        return Vec::new();
    };

    siblings
        .iter()
        .map(|item| MenuNode {
            id: item.id,
            path: item.path.clone(),
            label: item.label.clone(),
            icon: item.icon.clone(),
            sort_order: item.sort_order,
            children: build_level(Some(item.id), by_parent),
        })
        .collect()
}

/// Would re-parenting `item` under `new_parent` create a cycle?
///
/// Walks up from `new_parent`; reaching `item` means the new parent is the
/// item itself or one of its descendants.
pub fn creates_cycle(items: &[MenuItem], item: MenuItemId, new_parent: Option<MenuItemId>) -> bool {
    let parents: HashMap<MenuItemId, Option<MenuItemId>> =
        items.iter().map(|i| (i.id, i.parent_id)).collect();

    let mut seen = HashSet::new();
    let mut cursor = new_parent;
    while let Some(current) = cursor {
        if current == item {
            return true;
        }
        // An existing loop that does not pass through `item`.
        if !seen.insert(current) {
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    false
}

/// All transitive descendants of `root` (excluding `root`).
pub fn descendants(items: &[MenuItem], root: MenuItemId) -> Vec<MenuItemId> {
    let mut children: HashMap<MenuItemId, Vec<MenuItemId>> = HashMap::new();
    for item in items {
        if let Some(parent) = item.parent_id {
            children.entry(parent).or_default().push(item.id);
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        for child in children.get(&current).into_iter().flatten() {
            if seen.insert(*child) {
                out.push(*child);
                stack.push(*child);
            }
        }
    }
    out
}
