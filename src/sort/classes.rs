use anyhow::{anyhow, Result};

/// COCO class names in model output order.
///
/// Several entries keep their older dataset spellings (`motorbike`, `aeroplane`,
/// `sofa`, `pottedplant`, `diningtable`, `tvmonitor`); category lists must use the
/// same spelling to match.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorbike", "aeroplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "sofa", "pottedplant", "bed", "diningtable", "toilet", "tvmonitor", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Ordered, immutable class name table addressed by detector class id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
}

impl ClassTable {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(anyhow!("class table must not be empty"));
        }
        if let Some(blank) = names.iter().position(|name| name.trim().is_empty()) {
            return Err(anyhow!("class table entry {} is blank", blank));
        }
        Ok(Self { names })
    }

    pub fn coco() -> Self {
        Self {
            names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Name for a class id, or `None` when the id is outside the table.
    pub fn resolve(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|entry| entry == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.id_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_table_has_eighty_entries() {
        let table = ClassTable::coco();
        assert_eq!(table.len(), 80);
        assert_eq!(table.resolve(0), Some("person"));
        assert_eq!(table.resolve(39), Some("bottle"));
        assert_eq!(table.resolve(46), Some("banana"));
        assert_eq!(table.resolve(79), Some("toothbrush"));
    }

    #[test]
    fn out_of_range_ids_do_not_resolve() {
        let table = ClassTable::coco();
        assert_eq!(table.resolve(80), None);
        assert_eq!(table.resolve(usize::MAX), None);
    }

    #[test]
    fn custom_tables_reject_blank_names() {
        assert!(ClassTable::new(vec![]).is_err());
        assert!(ClassTable::new(vec!["can".into(), " ".into()]).is_err());
        let table = ClassTable::new(vec!["can".into(), "peel".into()]).unwrap();
        assert_eq!(table.id_of("peel"), Some(1));
    }
}
