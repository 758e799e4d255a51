use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::Progress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    #[default]
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Ar, Language::En];

    pub fn labels(self) -> &'static Labels {
        match self {
            Language::Ar => &ARABIC,
            Language::En => &ENGLISH,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Ar => write!(f, "ar"),
            Language::En => write!(f, "en"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" => Ok(Language::Ar),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{other}' (expected ar or en)")),
        }
    }
}

/// Every user-facing string for one language.
#[derive(Debug)]
pub struct Labels {
    pub teacher_performance_report: &'static str,
    pub teacher: &'static str,
    pub report_date: &'static str,
    pub date: &'static str,
    pub school_name: &'static str,
    pub subject: &'static str,
    pub grade: &'static str,
    pub branch: &'static str,
    pub evaluation_criteria: &'static str,
    pub criterion: &'static str,
    pub rating: &'static str,
    pub total_percentage: &'static str,
    pub additional_notes: &'static str,
    pub strategies: &'static str,
    pub aids: &'static str,
    pub programs: &'static str,
    pub not_set: &'static str,
    pub not_rated: &'static str,
    pub not_selected: &'static str,
    pub none: &'static str,
    pub dashboard_title: &'static str,
    pub export_date: &'static str,
    pub average_total: &'static str,
    pub unknown_teacher: &'static str,
    pub no_reports: &'static str,
    pub saved_reports: &'static str,
    pub progress_options: [&'static str; 3],
    pub branch_options: [&'static str; 3],
    pub default_criteria: [&'static str; 8],
}

impl Labels {
    pub fn progress(&self, progress: Progress) -> &'static str {
        self.progress_options[progress.rank()]
    }

    pub fn branch_name(&self, branch: crate::models::Branch) -> &'static str {
        use crate::models::Branch;
        match branch {
            Branch::Main => self.branch_options[0],
            Branch::Boys => self.branch_options[1],
            Branch::Girls => self.branch_options[2],
        }
    }
}

/// Matches a display label from any supported language.
pub fn progress_from_label(value: &str) -> Option<Progress> {
    Language::ALL.into_iter().find_map(|language| {
        let labels = language.labels();
        Progress::ALL
            .into_iter()
            .find(|progress| labels.progress(*progress) == value)
    })
}

static ENGLISH: Labels = Labels {
    teacher_performance_report: "Teacher Performance Report",
    teacher: "Teacher",
    report_date: "Report Date",
    date: "Date",
    school_name: "School Name",
    subject: "Subject",
    grade: "Grade",
    branch: "Branch",
    evaluation_criteria: "Evaluation Criteria",
    criterion: "Criterion",
    rating: "Rating",
    total_percentage: "Total Percentage",
    additional_notes: "Additional Notes",
    strategies: "Strategies Used",
    aids: "Teaching Aids Used",
    programs: "Programs Implemented",
    not_set: "Not set",
    not_rated: "Not rated",
    not_selected: "Not selected",
    none: "None",
    dashboard_title: "Aggregated Reports Dashboard",
    export_date: "Export Date",
    average_total: "Overall Average",
    unknown_teacher: "Unknown teacher",
    no_reports: "No reports to display.",
    saved_reports: "Saved reports",
    progress_options: ["Advanced", "On Track", "Delayed"],
    branch_options: ["Main", "Boys", "Girls"],
    default_criteria: [
        "Attendance at development meeting",
        "Curriculum progress",
        "Title of last lesson",
        "Weekly questions submission",
        "Student testing",
        "Implementation of subject programs",
        "Implementation of strategies",
        "Use of teaching aids",
    ],
};

static ARABIC: Labels = Labels {
    teacher_performance_report: "تقرير أداء المعلم",
    teacher: "المعلم",
    report_date: "تاريخ التقرير",
    date: "التاريخ",
    school_name: "اسم المدرسة",
    subject: "المادة",
    grade: "الصف",
    branch: "الفرع",
    evaluation_criteria: "معايير التقييم",
    criterion: "المعيار",
    rating: "التقييم",
    total_percentage: "النسبة الإجمالية",
    additional_notes: "ملاحظات إضافية",
    strategies: "الاستراتيجيات المستخدمة",
    aids: "الوسائل التعليمية المستخدمة",
    programs: "البرامج المنفذة",
    not_set: "غير محدد",
    not_rated: "لم يقيم",
    not_selected: "لم يحدد",
    none: "لا يوجد",
    dashboard_title: "لوحة التقارير المجمعة",
    export_date: "تاريخ التصدير",
    average_total: "المتوسط العام",
    unknown_teacher: "معلم غير معروف",
    no_reports: "لا توجد تقارير لعرضها.",
    saved_reports: "التقارير المحفوظة",
    progress_options: ["متقدم", "مطابق", "متأخر"],
    branch_options: ["رئيسي", "بنين", "بنات"],
    default_criteria: [
        "حضور اللقاء التطويري",
        "السير في المنهج",
        "عنوان آخر درس",
        "تسليم الأسئلة الأسبوعية",
        "اختبار الطلاب",
        "تنفيذ البرامج الخاصة بالمادة",
        "تنفيذ الاستراتيجيات",
        "استخدام وسائل تعليمية",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_from_either_language_resolve() {
        assert_eq!(progress_from_label("مطابق"), Some(Progress::OnTrack));
        assert_eq!(progress_from_label("Delayed"), Some(Progress::Delayed));
        assert_eq!(progress_from_label("delayed"), None);
        assert_eq!(progress_from_label("garbage"), None);
    }

    #[test]
    fn language_parses_case_insensitively() {
        assert_eq!("AR".parse::<Language>(), Ok(Language::Ar));
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::default().to_string(), "en");
    }
}
