//! Built-in class-name tables for detection.

use std::collections::HashMap;

/// The 80 COCO dataset class names, indexed by class id.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Builds a class-name map (string-of-integer id to name) from an ordered
/// name list.
///
/// # Arguments
///
/// * `names` - Class names where the index is the class id.
///
/// # Returns
///
/// A map from stringified class id to class name.
pub fn class_name_map(names: &[&str]) -> HashMap<String, String> {
    names
        .iter()
        .enumerate()
        .map(|(id, name)| (id.to_string(), name.to_string()))
        .collect()
}

/// Returns the COCO class-name map.
pub fn coco_class_names() -> HashMap<String, String> {
    class_name_map(&COCO_CLASSES)
}
