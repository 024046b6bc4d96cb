//! C4 — reachability analyzer. Computes which nodes become disconnected
//! from every entrypoint when the target is treated as removed, and the
//! boundary traffic each disconnected node loses (spec.md §4.4).

use std::collections::{HashSet, VecDeque};

use models::{GraphSnapshot, ServiceId, UnreachableService};

/// Entrypoints are nodes with zero incoming edges in the snapshot,
/// excluding the target. If none exist — a truncated neighborhood with no
/// true roots — every non-target node is treated as an entrypoint so BFS
/// still has somewhere to start from.
pub fn entrypoints(snapshot: &GraphSnapshot) -> Vec<ServiceId> {
    let target = &snapshot.target_key;
    let mut roots: Vec<ServiceId> = snapshot
        .nodes
        .keys()
        .filter(|id| *id != target && snapshot.incoming_of(id).is_empty())
        .cloned()
        .collect();
    if roots.is_empty() {
        roots = snapshot.nodes.keys().filter(|id| *id != target).cloned().collect();
    }
    roots.sort();
    roots
}

/// BFS from every entrypoint, never traversing through the target,
/// collecting everything still reachable.
fn reachable_set(snapshot: &GraphSnapshot, entrypoints: &[ServiceId]) -> HashSet<ServiceId> {
    let target = &snapshot.target_key;
    let mut reachable: HashSet<ServiceId> = HashSet::new();
    let mut queue: VecDeque<ServiceId> = VecDeque::new();

    for start in entrypoints {
        if start == target || reachable.contains(start) {
            continue;
        }
        reachable.insert(start.clone());
        queue.push_back(start.clone());
    }

    while let Some(current) = queue.pop_front() {
        for edge in snapshot.outgoing_of(&current) {
            if &edge.target == target || reachable.contains(&edge.target) {
                continue;
            }
            reachable.insert(edge.target.clone());
            queue.push_back(edge.target.clone());
        }
    }

    reachable
}

/// Computes the unreachable-service list, sorted by total lost RPS
/// descending, per the three-term accounting in spec.md §4.4.
pub fn unreachable_services(snapshot: &GraphSnapshot) -> Vec<UnreachableService> {
    let target = &snapshot.target_key;
    let roots = entrypoints(snapshot);
    let reachable = reachable_set(snapshot, &roots);

    let mut unreachable = Vec::new();
    for id in snapshot.nodes.keys() {
        if id == target || reachable.contains(id) {
            continue;
        }
        let mut lost_from_target = 0.0;
        let mut lost_from_reachable_cuts = 0.0;
        for edge in snapshot.incoming_of(id) {
            if &edge.source == target {
                lost_from_target += edge.rate;
            } else if reachable.contains(&edge.source) {
                lost_from_reachable_cuts += edge.rate;
            }
        }
        let lost_total = lost_from_target + lost_from_reachable_cuts;
        unreachable.push(UnreachableService {
            service_id: id.clone(),
            lost_from_target_rps: lost_from_target,
            lost_from_reachable_cuts_rps: lost_from_reachable_cuts,
            lost_total_rps: lost_total,
        });
    }

    unreachable.sort_by(|a, b| {
        b.lost_total_rps
            .partial_cmp(&a.lost_total_rps)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.service_id.cmp(&b.service_id))
    });
    unreachable
}
