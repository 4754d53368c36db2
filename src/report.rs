use crate::charts::{render_chart, ChartKind};
use crate::error::Result;
use crate::period::BillingPeriod;
use crate::schema::{CountrySummary, Record};
use crate::BillingRun;
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use zip::write::FileOptions;

#[derive(Serialize)]
struct SummaryRow<'a> {
    country: &'a str,
    country_count: u64,
    submission_count: u64,
    submission_count_perc: String,
}

#[derive(Serialize)]
struct DatasetRow<'a> {
    uid: &'a str,
    name: &'a str,
    #[serde(rename = "owner__username")]
    owner: &'a str,
    date_deployed: &'a str,
    submission_count: Option<u64>,
    country: &'a str,
    sector: &'a str,
}

impl<'a> From<&'a CountrySummary> for SummaryRow<'a> {
    fn from(row: &'a CountrySummary) -> Self {
        Self {
            country: &row.country,
            country_count: row.project_count,
            submission_count: row.submission_total,
            submission_count_perc: format!("{:.2}", row.submission_share_percent),
        }
    }
}

impl<'a> From<&'a Record> for DatasetRow<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            uid: &record.id,
            name: record.name.as_deref().unwrap_or(""),
            owner: record.owner.as_deref().unwrap_or(""),
            date_deployed: record.deployment_timestamp.as_deref().unwrap_or(""),
            submission_count: record.submission_count,
            country: record.country.as_deref().unwrap_or(""),
            sector: record.sector.as_deref().unwrap_or(""),
        }
    }
}

/// Writes the files of one billing month into a single folder and bundles them.
pub struct ReportAssembler {
    output_dir: PathBuf,
    period: BillingPeriod,
    author: String,
    /// Program used to turn the `.qmd` report into HTML. Rendering is skipped when unset.
    quarto: Option<String>,
}

impl ReportAssembler {
    pub fn new(output_dir: impl Into<PathBuf>, period: BillingPeriod) -> Self {
        Self {
            output_dir: output_dir.into(),
            period,
            author: "Finance".to_string(),
            quarto: None,
        }
    }

    /// Renders the report to HTML with `program render <qmd> --to html` during
    /// [`assemble`](Self::assemble). Usually `program` is just `"quarto"`.
    pub fn with_quarto_render(mut self, program: impl Into<String>) -> Self {
        self.quarto = Some(program.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path_for(&self, stem: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", stem, self.period.key(), extension))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.path_for("billing_details", "csv")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.path_for("kobo_metadata", "csv")
    }

    pub fn report_path(&self) -> PathBuf {
        self.path_for("finance_report", "qmd")
    }

    pub fn html_report_path(&self) -> PathBuf {
        self.path_for("finance_report", "html")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.path_for("billing_details", "zip")
    }

    pub fn chart_path(&self, kind: ChartKind) -> PathBuf {
        self.output_dir.join(kind.file_name(&self.period.key()))
    }

    pub fn write_summary_csv(&self, summaries: &[CountrySummary]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.summary_path();
        let mut writer = csv::Writer::from_path(&path)?;
        if summaries.is_empty() {
            writer.write_record([
                "country",
                "country_count",
                "submission_count",
                "submission_count_perc",
            ])?;
        }
        for row in summaries {
            writer.serialize(SummaryRow::from(row))?;
        }
        writer.flush()?;
        info!("Billing table written to {}", path.display());
        Ok(path)
    }

    pub fn write_dataset_csv(&self, dataset: &[Record]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.dataset_path();
        let mut writer = csv::Writer::from_path(&path)?;
        if dataset.is_empty() {
            writer.write_record([
                "uid",
                "name",
                "owner__username",
                "date_deployed",
                "submission_count",
                "country",
                "sector",
            ])?;
        }
        for record in dataset {
            writer.serialize(DatasetRow::from(record))?;
        }
        writer.flush()?;
        Ok(path)
    }

    pub fn write_charts(&self, summaries: &[CountrySummary]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;
        let title = self.period.key();
        let mut paths = Vec::with_capacity(ChartKind::ALL.len());
        for kind in ChartKind::ALL {
            let path = self.chart_path(kind);
            fs::write(&path, render_chart(kind, summaries, &title))?;
            paths.push(path);
        }
        info!("{} charts written to {}", paths.len(), self.output_dir.display());
        Ok(paths)
    }

    pub fn render_report(
        &self,
        run: &BillingRun,
        generated_on: NaiveDate,
        log_text: &str,
    ) -> String {
        let key = self.period.key();
        let mut doc = String::new();

        doc.push_str("---\n");
        doc.push_str(&format!("title: \"Finance Report for {}\"\n", key));
        doc.push_str(&format!("author: \"{}\"\n", self.author));
        doc.push_str(&format!("date: \"{}\"\n", generated_on.format("%B %d, %Y")));
        doc.push_str("format:\n  html: default\n---\n\n");

        doc.push_str("# Summary\n\n");
        if run.is_empty() {
            doc.push_str("No forms were billable for this month.\n\n");
        }
        doc.push_str(&format!("- Forms received from the server: {}\n", run.input_records));
        doc.push_str(&format!("- Forms deployed in {}: {}\n", key, run.period_records));
        doc.push_str(&format!("- Forms billed: {}\n", run.dataset.len()));
        doc.push_str(&format!("- Countries: {}\n", run.country_count()));
        doc.push_str(&format!("- Total submissions: {}\n\n", run.total_submissions()));

        doc.push_str("## Exclusions\n\n");
        doc.push_str("| Stage | Forms removed |\n|---|---:|\n");
        doc.push_str(&format!("| Account mask | {} |\n", run.removed.owner_mask));
        doc.push_str(&format!(
            "| Submission count mask | {} |\n",
            run.removed.submission_mask
        ));
        doc.push_str(&format!(
            "| Country mask | {} (missing: {}, empty: {}, masked: {}) |\n\n",
            run.removed.country_mask,
            run.removed.missing_country,
            run.removed.empty_country,
            run.removed.masked_country()
        ));

        if !run.summaries.is_empty() {
            doc.push_str("## Usage per country\n\n");
            doc.push_str("| Country | Projects | Submissions | Share [%] |\n|---|---:|---:|---:|\n");
            for row in &run.summaries {
                doc.push_str(&format!(
                    "| {} | {} | {} | {:.2} |\n",
                    row.country, row.project_count, row.submission_total, row.submission_share_percent
                ));
            }
            doc.push('\n');
        }

        doc.push_str("# Visualizations\n\n");
        doc.push_str("The following visualizations were generated for this billing month:\n\n");
        for kind in ChartKind::ALL {
            doc.push_str(&format!(
                "- **{title}**:\n\n<img src=\"{file}\" style=\"width:70%;\" alt=\"{title}\">\n\n",
                title = kind.title(),
                file = kind.file_name(&key)
            ));
        }

        doc.push_str("# Full Logs\n\n<details>\n<summary>Click to expand full logs</summary>\n\n```\n");
        doc.push_str(log_text);
        if !log_text.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str("```\n\n</details>\n");
        doc
    }

    pub fn write_report(
        &self,
        run: &BillingRun,
        generated_on: NaiveDate,
        log_text: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.report_path();
        fs::write(&path, self.render_report(run, generated_on, log_text))?;
        info!("Finance report written to {}", path.display());
        Ok(path)
    }

    /// Runs the configured renderer on `report`. A missing binary or a failed
    /// render is logged and yields `None`; the billing outputs stay valid.
    pub fn render_html(&self, report: &Path) -> Option<PathBuf> {
        let program = self.quarto.as_deref()?;
        info!("Rendering {} to HTML with {}", report.display(), program);

        let output = match Command::new(program)
            .arg("render")
            .arg(report)
            .args(["--to", "html"])
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to render Quarto report: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            error!(
                "Failed to render Quarto report ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let html = self.html_report_path();
        if html.exists() {
            info!("Quarto report rendered successfully: {}", html.display());
            Some(html)
        } else {
            warn!("{} reported success but {} is missing", program, html.display());
            None
        }
    }

    /// Zips the given files, stored flat under their file names.
    pub fn write_archive(&self, files: &[PathBuf]) -> Result<PathBuf> {
        let path = self.archive_path();
        let file = File::create(&path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for source in files {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string());
            writer.start_file(name, options)?;
            writer.write_all(&fs::read(source)?)?;
        }
        writer.finish()?;
        info!("ZIP archive created successfully: {}", path.display());
        Ok(path)
    }

    /// Writes every output of the run and returns the archive path.
    pub fn assemble(
        &self,
        run: &BillingRun,
        generated_on: NaiveDate,
        log_text: &str,
    ) -> Result<PathBuf> {
        let mut files = vec![
            self.write_summary_csv(&run.summaries)?,
            self.write_dataset_csv(&run.dataset)?,
        ];
        files.extend(self.write_charts(&run.summaries)?);
        let report = self.write_report(run, generated_on, log_text)?;
        files.push(report.clone());
        files.extend(self.render_html(&report));
        self.write_archive(&files)
    }
}
