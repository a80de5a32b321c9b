//! ステージ間の依存関係

/// 依存先ステージに対する起動条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyCondition {
    /// 依存先が起動していればよい
    Started,
    /// 依存先のヘルスチェックが healthy
    Healthy,
    /// 依存先が終了コード 0 で完了している（デフォルト）
    #[default]
    CompletedSuccessfully,
}

impl DependencyCondition {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "started" | "service_started" => Some(Self::Started),
            "healthy" | "service_healthy" => Some(Self::Healthy),
            "completed-successfully"
            | "completed_successfully"
            | "service_completed_successfully" => Some(Self::CompletedSuccessfully),
            _ => None,
        }
    }

    /// compose の depends_on.condition で使用する文字列に変換
    pub fn as_compose_str(&self) -> &'static str {
        match self {
            Self::Started => "service_started",
            Self::Healthy => "service_healthy",
            Self::CompletedSuccessfully => "service_completed_successfully",
        }
    }
}

/// 依存エッジ（依存先ステージ名と条件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub target: String,
    pub condition: DependencyCondition,
}

impl DependencyEdge {
    pub fn new(target: impl Into<String>, condition: DependencyCondition) -> Self {
        Self {
            target: target.into(),
            condition,
        }
    }

    /// 依存先の正常終了を待つエッジ
    pub fn completed(target: impl Into<String>) -> Self {
        Self::new(target, DependencyCondition::CompletedSuccessfully)
    }
}
