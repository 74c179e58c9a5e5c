//! Candidate pipeline: hiring stages, table views and page navigation.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::api::types::{format_minute, Candidate, Page};
use crate::config::PageSizes;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HiringStatus {
    InvitationSent,
    TestFinished,
    AwaitingInterview,
    Rejected,
    SendingOffer,
    Done,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Blue,
    Green,
    Orange,
    Red,
    Purple,
    DarkGreen,
    Grey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    pub tone: Tone,
}

impl HiringStatus {
    const WIRE: [(HiringStatus, &'static str); 6] = [
        (HiringStatus::InvitationSent, "test invitation sent"),
        (HiringStatus::TestFinished, "test finished"),
        (HiringStatus::AwaitingInterview, "waiting for interview"),
        (HiringStatus::Rejected, "reject"),
        (HiringStatus::SendingOffer, "sending offer"),
        (HiringStatus::Done, "done"),
    ];

    /// Anything the backend sends that is not a known stage maps to
    /// `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        let s = s.trim();
        Self::WIRE
            .iter()
            .find(|(_, tag)| tag.eq_ignore_ascii_case(s))
            .map(|(status, _)| *status)
            .unwrap_or(HiringStatus::Unknown)
    }

    pub fn wire(self) -> &'static str {
        Self::WIRE
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, tag)| *tag)
            .unwrap_or("unknown")
    }

    pub fn badge(self) -> Badge {
        let (label, tone) = match self {
            HiringStatus::InvitationSent => ("Test invited", Tone::Blue),
            HiringStatus::TestFinished => ("Test finished", Tone::Green),
            HiringStatus::AwaitingInterview => ("Awaiting interview", Tone::Orange),
            HiringStatus::Rejected => ("Rejected", Tone::Red),
            HiringStatus::SendingOffer => ("Sending offer", Tone::Purple),
            HiringStatus::Done => ("Done", Tone::DarkGreen),
            HiringStatus::Unknown => ("Unknown", Tone::Grey),
        };
        Badge { label, tone }
    }
}

impl fmt::Display for HiringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.badge().label)
    }
}

impl Serialize for HiringStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire())
    }
}

impl<'de> Deserialize<'de> for HiringStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(HiringStatus::from_wire)
            .unwrap_or_default())
    }
}

/// Position within a paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// 0-based.
    pub number: u32,
    pub total_pages: u32,
    pub first: bool,
    pub last: bool,
}

impl<T> From<&Page<T>> for PageInfo {
    fn from(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            first: page.first,
            last: page.last,
        }
    }
}

impl PageInfo {
    /// Only pages in `0..total_pages` can be opened.
    pub fn go_to(&self, page: u32) -> Option<u32> {
        (page < self.total_pages).then_some(page)
    }

    pub fn previous(&self) -> Option<u32> {
        if self.first {
            return None;
        }
        self.number.checked_sub(1).and_then(|p| self.go_to(p))
    }

    pub fn next(&self) -> Option<u32> {
        if self.last {
            return None;
        }
        self.go_to(self.number + 1)
    }
}

impl fmt::Display for PageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {} of {}", self.number + 1, self.total_pages.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Email,
    Mobile,
    Status,
    Score,
    Paper,
    CheatRisk,
    Vendor,
    CreatedAt,
    PaperEndTime,
    Report,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "NAME",
            Column::Email => "EMAIL",
            Column::Mobile => "MOBILE",
            Column::Status => "STATUS",
            Column::Score => "SCORE",
            Column::Paper => "PAPER",
            Column::CheatRisk => "CHEAT RISK",
            Column::Vendor => "VENDOR",
            Column::CreatedAt => "CREATED",
            Column::PaperEndTime => "EXAM ENDED",
            Column::Report => "REPORT",
        }
    }

    pub fn width(self) -> usize {
        match self {
            Column::Name | Column::Mobile | Column::Vendor => 16,
            Column::Email => 28,
            Column::Status => 20,
            Column::Score => 10,
            Column::Paper => 24,
            Column::CheatRisk => 28,
            Column::CreatedAt | Column::PaperEndTime => 17,
            Column::Report => 40,
        }
    }
}

/// Which candidate table is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateView {
    /// Dashboard excerpt.
    Overview,
    /// Vendor's full candidate list.
    Detail,
    /// PMO candidate details, including exam end time and report link.
    Pmo,
}

impl CandidateView {
    pub fn title(self) -> &'static str {
        match self {
            CandidateView::Overview => "Candidate overview",
            CandidateView::Detail => "Candidate management",
            CandidateView::Pmo => "PMO - Candidate details",
        }
    }

    pub fn page_size(self, sizes: &PageSizes) -> u32 {
        match self {
            CandidateView::Overview => sizes.overview,
            CandidateView::Detail | CandidateView::Pmo => sizes.detail,
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            CandidateView::Overview => &[
                Column::Name,
                Column::Status,
                Column::Score,
                Column::Paper,
                Column::CheatRisk,
                Column::CreatedAt,
            ],
            CandidateView::Detail => &[
                Column::Name,
                Column::Email,
                Column::Mobile,
                Column::Status,
                Column::Score,
                Column::Paper,
                Column::CheatRisk,
                Column::Vendor,
                Column::CreatedAt,
            ],
            CandidateView::Pmo => &[
                Column::Name,
                Column::Mobile,
                Column::Email,
                Column::Status,
                Column::Vendor,
                Column::CreatedAt,
                Column::PaperEndTime,
                Column::Paper,
                Column::Report,
                Column::Score,
                Column::CheatRisk,
            ],
        }
    }

    pub fn cell(self, candidate: &Candidate, column: Column) -> String {
        let or_blank = |v: &Option<String>| v.clone().unwrap_or_default();
        match column {
            Column::Name => candidate.name.clone(),
            Column::Email => or_blank(&candidate.email),
            Column::Mobile => or_blank(&candidate.mobile),
            Column::Status => candidate.hiring_status.to_string(),
            Column::Score => score_text(candidate),
            Column::Paper => candidate
                .paper_name
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "--".to_string()),
            Column::CheatRisk => {
                let desc = candidate.cheat_info_desc.as_deref().filter(|d| !d.is_empty());
                match (self, desc) {
                    (CandidateView::Pmo, Some(desc)) => desc.to_string(),
                    (CandidateView::Pmo, None) => "None".to_string(),
                    (_, Some(desc)) => format!("Cheating risk: {desc}"),
                    (_, None) => "No cheating risk".to_string(),
                }
            }
            Column::Vendor => or_blank(&candidate.vendor_company),
            Column::CreatedAt => format_minute(candidate.created_time),
            Column::PaperEndTime => format_minute(candidate.paper_end_time),
            Column::Report => candidate
                .pdf_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{score:.1}")
    }
}

/// `user / paper`, or `--` before the candidate has a score.
pub fn score_text(candidate: &Candidate) -> String {
    match candidate.user_score {
        Some(user) => {
            let paper = candidate
                .paper_score
                .map(format_score)
                .unwrap_or_else(|| "?".to_string());
            format!("{} / {}", format_score(user), paper)
        }
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_stages_round_trip() {
        for (status, tag) in HiringStatus::WIRE {
            assert_eq!(HiringStatus::from_wire(tag), status);
            assert_eq!(status.wire(), tag);
        }
        assert_eq!(HiringStatus::from_wire("Sending Offer"), HiringStatus::SendingOffer);
    }

    #[test]
    fn unknown_stage_falls_back() {
        let candidate: Candidate = serde_json::from_value(json!({
            "id": 1,
            "name": "Ada",
            "hiringStatus": "ghosted"
        }))
        .unwrap();
        assert_eq!(candidate.hiring_status, HiringStatus::Unknown);
        assert_eq!(candidate.hiring_status.badge().tone, Tone::Grey);

        let candidate: Candidate =
            serde_json::from_value(json!({ "id": 2, "hiringStatus": null })).unwrap();
        assert_eq!(candidate.hiring_status, HiringStatus::Unknown);
    }

    #[test]
    fn badges() {
        assert_eq!(
            HiringStatus::Rejected.badge(),
            Badge {
                label: "Rejected",
                tone: Tone::Red
            }
        );
        assert_eq!(HiringStatus::InvitationSent.to_string(), "Test invited");
    }

    #[test]
    fn page_navigation_respects_bounds() {
        let middle = PageInfo {
            number: 1,
            total_pages: 3,
            first: false,
            last: false,
        };
        assert_eq!(middle.previous(), Some(0));
        assert_eq!(middle.next(), Some(2));
        assert_eq!(middle.go_to(3), None);
        assert_eq!(middle.to_string(), "Page 2 of 3");

        let first = PageInfo {
            number: 0,
            total_pages: 3,
            first: true,
            last: false,
        };
        assert_eq!(first.previous(), None);

        let last = PageInfo {
            number: 2,
            total_pages: 3,
            first: false,
            last: true,
        };
        assert_eq!(last.next(), None);

        let empty = PageInfo {
            number: 0,
            total_pages: 0,
            first: true,
            last: true,
        };
        assert_eq!(empty.next(), None);
        assert_eq!(empty.go_to(0), None);
        assert_eq!(empty.to_string(), "Page 1 of 1");
    }

    #[test]
    fn view_page_sizes_and_columns() {
        let sizes = PageSizes::default();
        assert_eq!(CandidateView::Overview.page_size(&sizes), 5);
        assert_eq!(CandidateView::Detail.page_size(&sizes), 10);
        assert_eq!(CandidateView::Pmo.page_size(&sizes), 10);

        assert!(!CandidateView::Overview.columns().contains(&Column::Email));
        assert!(CandidateView::Detail.columns().contains(&Column::Vendor));
        assert!(CandidateView::Pmo.columns().contains(&Column::Report));
    }

    #[test]
    fn cells_render_placeholders() {
        let candidate = Candidate {
            id: 1,
            name: "Ada".into(),
            ..Default::default()
        };
        assert_eq!(CandidateView::Detail.cell(&candidate, Column::Score), "--");
        assert_eq!(CandidateView::Detail.cell(&candidate, Column::Paper), "--");
        assert_eq!(
            CandidateView::Detail.cell(&candidate, Column::CheatRisk),
            "No cheating risk"
        );
        assert_eq!(CandidateView::Pmo.cell(&candidate, Column::CheatRisk), "None");
        assert_eq!(CandidateView::Pmo.cell(&candidate, Column::Report), "N/A");
        assert_eq!(CandidateView::Pmo.cell(&candidate, Column::CreatedAt), "N/A");
    }

    #[test]
    fn cells_render_values() {
        let candidate = Candidate {
            id: 1,
            name: "Ada".into(),
            user_score: Some(85.0),
            paper_score: Some(100.0),
            cheat_info_desc: Some("tab switching".into()),
            ..Default::default()
        };
        assert_eq!(CandidateView::Overview.cell(&candidate, Column::Score), "85 / 100");
        assert_eq!(
            CandidateView::Overview.cell(&candidate, Column::CheatRisk),
            "Cheating risk: tab switching"
        );
        assert_eq!(
            CandidateView::Pmo.cell(&candidate, Column::CheatRisk),
            "tab switching"
        );

        let partial = Candidate {
            user_score: Some(72.5),
            ..Default::default()
        };
        assert_eq!(score_text(&partial), "72.5 / ?");
    }
}
