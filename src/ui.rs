use iocraft::prelude::*;

use crate::pipeline::{Cleanup, Outcome, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    Done,
    Failed,
    #[default]
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct StepView {
    pub name: String,
    pub status: StepStatus,
    pub detail: Option<String>,
}

impl StepView {
    fn new(name: &str, status: StepStatus, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail,
        }
    }
}

pub fn steps_from_report(report: &Report) -> Vec<StepView> {
    let download = match &report.outcome {
        Outcome::DownloadFailed(e) => StepView::new("Download", StepStatus::Failed, Some(e.to_string())),
        _ => StepView::new(
            "Download",
            StepStatus::Done,
            report.temp_file.as_ref().map(|p| p.display().to_string()),
        ),
    };

    let upload = match &report.outcome {
        Outcome::Updated => StepView::new("Upload", StepStatus::Done, None),
        Outcome::UploadFailed(e) => StepView::new("Upload", StepStatus::Failed, Some(e.to_string())),
        Outcome::DownloadFailed(_) => StepView::new("Upload", StepStatus::Skipped, None),
    };

    let cleanup = match &report.cleanup {
        Cleanup::NotNeeded => StepView::new("Cleanup", StepStatus::Skipped, None),
        Cleanup::Removed => StepView::new("Cleanup", StepStatus::Done, None),
        Cleanup::AlreadyGone => StepView::new(
            "Cleanup",
            StepStatus::Done,
            Some("temporary file was already gone".to_string()),
        ),
        Cleanup::Failed(e) => StepView::new("Cleanup", StepStatus::Failed, Some(e.to_string())),
    };

    vec![download, upload, cleanup]
}

#[derive(Default, Props)]
struct StatusIconProps {
    status: StepStatus,
}

#[component]
fn StatusIcon(props: &StatusIconProps) -> impl Into<AnyElement<'static>> {
    match props.status {
        StepStatus::Done => element! {
            Text (
                color: Color::Green,
                content: "◆"
            )
        }
        .into_any(),
        StepStatus::Failed => element! {
            Text (
                color: Color::Red,
                content: "▲"
            )
        }
        .into_any(),
        StepStatus::Skipped => element! {
            Text (
                color: Color::Reset,
                content: "◇"
            )
        }
        .into_any(),
    }
}

#[derive(Default, Props)]
struct StepLineProps {
    step: StepView,
}

#[component]
fn StepLine(props: &StepLineProps) -> impl Into<AnyElement<'static>> {
    let step = &props.step;
    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(content: "│")
            View(flex_direction: FlexDirection::Row) {
                StatusIcon(status: step.status)
                Text(weight: Weight::Bold, content: format!(" {}", &step.name))
            }
            #(step.detail.as_ref().map(|detail| element! {
                Text(content: format!("│ {}", detail))
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct RunSummaryProps {
    pub title: String,
    pub steps: Vec<StepView>,
}

#[component]
pub fn RunSummary(props: &RunSummaryProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            View(flex_direction: FlexDirection::Row) {
                Text(content: "┌ ")
                View(background_color: Color::Blue) {
                    Text(content: &props.title, color: Color::White)
                }
            }
            #(props.steps.clone().into_iter().map(|step| {
                element! {
                    StepLine(step: step)
                }
            }))
            Text(content: "└")
        }
    }
}

#[derive(Default, Props)]
pub struct MessageProps {
    pub message: String,
}

#[component]
pub fn SuccessMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Green, content: "✔ ")
            Text(content: &props.message)
        }
    }
}

#[component]
pub fn ErrorMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Red, content: "✘ ")
            Text(content: &props.message)
        }
    }
}
