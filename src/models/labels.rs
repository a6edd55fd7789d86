use serde::Serialize;
use std::fmt;

/// 烘焙度类别，顺序与模型输出下标一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoastLevel {
    Dark,
    Green,
    Light,
    Medium,
}

impl fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoastLevel::Dark => "Dark",
            RoastLevel::Green => "Green",
            RoastLevel::Light => "Light",
            RoastLevel::Medium => "Medium",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassLabel {
    pub name: RoastLevel,
    pub description: &'static str,
}

pub const NUM_CLASSES: usize = 4;

/// 固定标签表
pub static CLASS_LABELS: [ClassLabel; NUM_CLASSES] = [
    ClassLabel {
        name: RoastLevel::Dark,
        description: "Dark roast beans are roasted the longest. They have an oily surface, \
                      a deep brown to almost black color, low acidity and a bold, bitter, \
                      smoky flavor.",
    },
    ClassLabel {
        name: RoastLevel::Green,
        description: "Green beans are raw, unroasted coffee. They are pale green, dense and \
                      grassy in aroma, and must be roasted before brewing.",
    },
    ClassLabel {
        name: RoastLevel::Light,
        description: "Light roast beans are light brown with a dry surface. They keep most of \
                      the origin character, with high acidity and fruity or floral notes.",
    },
    ClassLabel {
        name: RoastLevel::Medium,
        description: "Medium roast beans are medium brown with a balanced body. Acidity and \
                      sweetness are even, with caramel and nutty notes.",
    },
];

/// 取最大值下标，并列时取最小下标；空输入或全部为NaN时返回None
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// 单次预测结果，每次预测整体替换
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: ClassLabel,
    pub confidences: [f32; NUM_CLASSES],
}

impl PredictionResult {
    pub fn from_confidences(confidences: [f32; NUM_CLASSES]) -> Option<Self> {
        let index = argmax(&confidences)?;
        Some(Self {
            label: CLASS_LABELS[index],
            confidences,
        })
    }

    pub fn confidence(&self) -> f32 {
        let index = CLASS_LABELS
            .iter()
            .position(|l| l.name == self.label.name)
            .unwrap_or(0);
        self.confidences[index]
    }
}
