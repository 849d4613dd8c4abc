// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Built-in skeleton presets.

use crate::color::Color;
use crate::skeleton::{Node, SkeletonGraph};

/// COCO-Pose keypoint names in dataset order.
pub const COCO_KEYPOINTS: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// COCO-Pose dataset skeleton structure (pairs of keypoint indices)
/// Defines which keypoints connect to form the pose skeleton
pub const COCO_SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // left hip to right hip
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // left shoulder to right shoulder
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // left eye to right eye
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

/// Left/right keypoint pairs swapped by a horizontal flip.
pub const COCO_SYMMETRY: [[usize; 2]; 8] = [
    [1, 2],
    [3, 4],
    [5, 6],
    [7, 8],
    [9, 10],
    [11, 12],
    [13, 14],
    [15, 16],
];

/// Keypoint color indices mapping to `POSE_COLORS`
/// Mapping: arms=blue, legs=orange, face=green
pub const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0];

/// Default editor layout of a person facing the viewer (x right, y down).
const COCO_LAYOUT: [(f64, f64); 17] = [
    (0.0, -80.0),
    (-8.0, -88.0),
    (8.0, -88.0),
    (-18.0, -84.0),
    (18.0, -84.0),
    (-35.0, -50.0),
    (35.0, -50.0),
    (-45.0, -10.0),
    (45.0, -10.0),
    (-50.0, 25.0),
    (50.0, 25.0),
    (-20.0, 30.0),
    (20.0, 30.0),
    (-22.0, 85.0),
    (22.0, 85.0),
    (-24.0, 140.0),
    (24.0, 140.0),
];

/// The 17-keypoint COCO body skeleton with limbs and left/right symmetry.
#[must_use]
pub fn coco_pose() -> SkeletonGraph {
    let mut graph = SkeletonGraph::new();

    for (i, name) in COCO_KEYPOINTS.iter().enumerate() {
        let (x, y) = COCO_LAYOUT[i];
        let mut node = Node::new(*name, x, y);
        node.color = Color::from_pose_index(KPT_COLOR_INDICES[i]);
        node.filled = true;
        let inserted = graph.insert_node(node).is_ok();
        debug_assert!(inserted, "duplicate COCO keypoint {name}");
    }
    for [a, b] in COCO_SKELETON {
        graph.add_edge(COCO_KEYPOINTS[a], COCO_KEYPOINTS[b]);
    }
    for [a, b] in COCO_SYMMETRY {
        graph.add_symmetry(COCO_KEYPOINTS[a], COCO_KEYPOINTS[b]);
    }

    graph
}
