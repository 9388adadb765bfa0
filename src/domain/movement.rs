// Motion rules: velocity toward a destination, fixed-step integration, and
// the stop test that snaps an entity onto its target when it overshoots.

use crate::domain::entity::Entity;

/// Velocity components for an entity moving from its current position toward
/// `going_x`/`going_y` at its declared `speed`. A zero-length ray yields rest.
pub fn velocity(entity: &Entity) -> (f64, f64) {
    let dx = entity.num("going_x").unwrap_or_default() - entity.x();
    let dy = entity.num("going_y").unwrap_or_default() - entity.y();
    let distance = (dx * dx + dy * dy).sqrt();
    if distance == 0.0 {
        return (0.0, 0.0);
    }

    let speed = entity.speed();
    (dx / distance * speed, dy / distance * speed)
}

/// Advances the entity by `delta_ms` of simulated time at its cached velocity.
pub fn move_entity(entity: &mut Entity, delta_ms: f64) {
    let vx = entity.num("vx").unwrap_or_default();
    let vy = entity.num("vy").unwrap_or_default();
    let x = entity.x() + vx * delta_ms / 1000.0;
    let y = entity.y() + vy * delta_ms / 1000.0;
    entity.set_position(x, y);
}

/// Captures the extrapolation state for the entity's current move command:
/// the start point, the velocity toward the destination, and the speed and
/// move counter the state was computed for.
pub fn engage_move(entity: &mut Entity) {
    entity.set_num("ref_speed", entity.speed());
    entity.set_num("from_x", entity.x());
    entity.set_num("from_y", entity.y());
    let (vx, vy) = velocity(entity);
    entity.set_num("vx", vx);
    entity.set_num("vy", vy);
    if let Some(move_num) = entity.get("move_num").cloned() {
        entity.set("engaged_move", move_num);
    }
}

/// Snaps the entity onto its destination once it has traveled the full span
/// from `from` to `going` along either axis. The comparison is
/// direction-aware: overshoot only counts when the traveled distance carries
/// the same sign as the span.
pub fn stop_logic(entity: &mut Entity) {
    let (Some(from_x), Some(from_y)) = (entity.num("from_x"), entity.num("from_y")) else {
        return;
    };
    let (Some(going_x), Some(going_y)) = (entity.num("going_x"), entity.num("going_y")) else {
        return;
    };

    let span_x = going_x - from_x;
    let span_y = going_y - from_y;
    let x = entity.x();
    let y = entity.y();

    let arrived = (span_x > 0.0 && x >= going_x)
        || (span_x < 0.0 && x <= going_x)
        || (span_y > 0.0 && y >= going_y)
        || (span_y < 0.0 && y <= going_y);

    if arrived {
        entity.set_position(going_x, going_y);
        entity.set("moving", false.into());
        entity.set_num("vx", 0.0);
        entity.set_num("vy", 0.0);
    }
}
