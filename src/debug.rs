use crate::lane::Lane;
use crate::VehicleId;
use serde_json::json;
use slotmap::Key;

thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records a lane change made during the current frame.
pub fn debug_lane_change(vehicle: VehicleId, from: Lane, to: Lane, pos: f64) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "lane_change",
            "vehicle": vehicle.data().as_ffi(),
            "from": from.index(),
            "to": to.index(),
            "pos": pos,
        }))
    })
}

/// Takes the events recorded since the last call.
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
