// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 比赛分析数据结构定义
/// Data structures for match analysis
use serde::Serialize;

// ========== 枚举类型 ==========

/// 检测类别 (与检测模型输出的类别编号一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassId {
    Ball = 0,
    Goalkeeper = 1,
    Player = 2,
    Referee = 3,
}

impl ClassId {
    pub const ALL: [ClassId; 4] = [
        ClassId::Ball,
        ClassId::Goalkeeper,
        ClassId::Player,
        ClassId::Referee,
    ];

    /// 模型输出编号 → 类别, 未知编号返回 None
    pub fn from_index(id: usize) -> Option<Self> {
        match id {
            0 => Some(ClassId::Ball),
            1 => Some(ClassId::Goalkeeper),
            2 => Some(ClassId::Player),
            3 => Some(ClassId::Referee),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassId::Ball => "ball",
            ClassId::Goalkeeper => "goalkeeper",
            ClassId::Player => "player",
            ClassId::Referee => "referee",
        }
    }
}

/// 球队 (聚类得到的两支队伍)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn index(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Team::A),
            1 => Some(Team::B),
            _ => None,
        }
    }
}

/// 渲染标签: 两支球队 + 裁判
///
/// 裁判类别(3)平移一位后为调色板索引 2, 与球队索引 0/1 不冲突
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Team(Team),
    Referee,
}

impl Role {
    /// 调色板索引
    pub fn palette_index(self) -> usize {
        match self {
            Role::Team(team) => team.index(),
            Role::Referee => ClassId::Referee.index() - 1,
        }
    }
}

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 底边中点 (球员站位锚点)
    pub fn bottom_center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, self.y2)
    }

    /// 顶边中点 (足球三角标记位置)
    pub fn top_center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, self.y1)
    }

    /// 四边各向外扩展 px 像素 (不做裁剪)
    pub fn pad(&self, px: f32) -> Self {
        Self {
            x1: self.x1 - px,
            y1: self.y1 - px,
            x2: self.x2 + px,
            y2: self.y2 + px,
        }
    }

    /// 裁剪到图像范围内
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// 单个检测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: ClassId,
    /// 跟踪器分配的ID (未跟踪时为 None)
    pub tracker_id: Option<u32>,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, class_id: ClassId) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            tracker_id: None,
        }
    }
}

/// 带渲染标签的检测 (分队之后)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabeledDetection {
    pub detection: Detection,
    pub role: Role,
}

/// 二维点 (像素坐标或球场坐标)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 球场关键点 (x, y, confidence)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}
