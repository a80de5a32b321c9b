//! ステージログの色付き表示

use colored::{Color, Colorize};
use pipeflow_container::{LogLine, LogSink};
use std::collections::HashMap;

const COLORS: [Color; 5] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
];

/// ステージごとに色を割り当てて標準出力に表示する
pub struct StagePrinter {
    colors: HashMap<String, Color>,
    width: usize,
}

impl StagePrinter {
    pub fn new(stages: &[String]) -> Self {
        let colors = stages
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), COLORS[idx % COLORS.len()]))
            .collect();
        let width = stages.iter().map(|s| s.len()).max().unwrap_or(0);
        Self { colors, width }
    }

    pub fn prefix(&self, stage: &str) -> String {
        let label = format!("[{:<width$}]", stage, width = self.width);
        match self.colors.get(stage) {
            Some(color) => label.color(*color).to_string(),
            None => label,
        }
    }
}

impl LogSink for StagePrinter {
    fn line(&mut self, line: &LogLine) {
        match &line.stage {
            Some(stage) => println!("{} {}", self.prefix(stage), line.text),
            None => println!("{}", line.text),
        }
    }
}
