use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    pub generated_by: String,
    pub generated_at: String,
}

/// Sections are kept in execution order; rendering never reorders them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<ReportHeader>,
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn with_header(generated_by: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            header: Some(ReportHeader {
                generated_by: generated_by.into(),
                generated_at: generated_at.into(),
            }),
            sections: Vec::new(),
        }
    }

    pub fn push(&mut self, title: impl Into<String>, body: impl Into<String>) -> &ReportSection {
        self.sections.push(ReportSection {
            title: title.into(),
            body: body.into(),
        });
        &self.sections[self.sections.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.sections.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(header) = &self.header {
            out.push_str(&format!(
                "Report generated by: {}\nDate: {}\n\n",
                header.generated_by, header.generated_at
            ));
        }
        out.push_str(&render_sections(&self.sections));
        out
    }
}

pub fn render_sections(sections: &[ReportSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!("=== {} ===\n{}\n\n", section.title, section.body));
    }
    out
}
