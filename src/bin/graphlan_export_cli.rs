use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

use graphlan_export::config::{parse_levels, read_clade_list, read_color_list, CladeMatch, ExportConfig};
use graphlan_export::error::Result;
use graphlan_export::export_annotations;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCladeMatch {
    /// Raw substring test
    Substring,
    /// Whole ranks only
    Boundary,
}

impl From<CliCladeMatch> for CladeMatch {
    fn from(mode: CliCladeMatch) -> Self {
        match mode {
            CliCladeMatch::Substring => CladeMatch::Substring,
            CliCladeMatch::Boundary => CladeMatch::RankBoundary,
        }
    }
}

/// Convert LEfSe output, abundance tables and biom tables into GraPhlAn input
#[derive(Parser, Debug)]
#[command(name = "graphlan-export")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Abundance table (LEfSe input format, pipe-separated lineages)
    #[arg(short = 'i', long = "lefse_input")]
    lefse_input: Option<PathBuf>,

    /// Biom (JSON) table with taxonomy metadata, used instead of --lefse_input
    #[arg(short = 'b', long = "biom")]
    biom: Option<PathBuf>,

    /// LEfSe result file
    #[arg(short = 'o', long = "lefse_output")]
    lefse_output: Option<PathBuf>,

    /// Output tree file
    #[arg(short = 't', long = "tree")]
    tree: PathBuf,

    /// Output annotation file
    #[arg(short = 'a', long = "annotation")]
    annotation: PathBuf,

    /// Levels to label on the tree, e.g. 1,2,3
    #[arg(long = "annotations", default_value = "")]
    annotations: String,

    /// Levels to label through the annotation legend, e.g. 4,5
    #[arg(long = "external_annotations", default_value = "")]
    external_annotations: String,

    /// Levels that get a shaded background, e.g. 2,3
    #[arg(long = "background_levels", default_value = "")]
    background_levels: String,

    /// File with clades to shade, one per line
    #[arg(long = "background_clades")]
    background_clades: Option<PathBuf>,

    /// Background colours: a file or a ';'-separated list of #rrggbb / h,s,v entries
    #[arg(long = "background_colors")]
    background_colors: Option<String>,

    /// How background clades are matched against lineages
    #[arg(long = "clade_match", value_enum, default_value = "boundary")]
    clade_match: CliCladeMatch,

    #[arg(long = "title")]
    title: Option<String>,

    #[arg(long = "title_font_size", default_value = "15")]
    title_font_size: u32,

    /// Size of clades with no abundance
    #[arg(long = "def_clade_size", default_value = "10.0")]
    def_clade_size: f64,

    #[arg(long = "min_clade_size", default_value = "20.0")]
    min_clade_size: f64,

    #[arg(long = "max_clade_size", default_value = "200.0")]
    max_clade_size: f64,

    #[arg(long = "def_font_size", default_value = "10")]
    def_font_size: u32,

    #[arg(long = "min_font_size", default_value = "8")]
    min_font_size: u32,

    #[arg(long = "max_font_size", default_value = "12")]
    max_font_size: u32,

    #[arg(long = "annotation_legend_font_size", default_value = "10")]
    annotation_legend_font_size: u32,

    #[arg(long = "class_legend_font_size", default_value = "10")]
    class_legend_font_size: u32,

    /// Minimum scaled clade size for a biomarker to be labelled
    #[arg(long = "abundance_threshold", default_value = "20.0")]
    abundance_threshold: f64,

    /// With abundances only: how many of the most abundant lineages become biomarkers
    #[arg(long = "most_abundant", default_value = "10")]
    most_abundant: usize,

    /// With abundances only: minimum number of distinct biomarkers to look for
    #[arg(long = "least_biomarkers", default_value = "3")]
    least_biomarkers: usize,
}

impl Cli {
    fn to_config(&self) -> Result<ExportConfig> {
        Ok(ExportConfig {
            abundance_table: self.lefse_input.clone(),
            biom_table: self.biom.clone(),
            lefse_output: self.lefse_output.clone(),
            title: self.title.clone(),
            title_font_size: self.title_font_size,
            def_clade_size: self.def_clade_size,
            min_clade_size: self.min_clade_size,
            max_clade_size: self.max_clade_size,
            def_font_size: self.def_font_size,
            min_font_size: self.min_font_size,
            max_font_size: self.max_font_size,
            annotation_legend_font_size: self.annotation_legend_font_size,
            class_legend_font_size: self.class_legend_font_size,
            abundance_threshold: self.abundance_threshold,
            annotations: parse_levels(&self.annotations)?,
            external_annotations: parse_levels(&self.external_annotations)?,
            background_levels: parse_levels(&self.background_levels)?,
            background_clades: match &self.background_clades {
                Some(path) => read_clade_list(path)?,
                None => Vec::new(),
            },
            background_colors: match &self.background_colors {
                Some(arg) => read_color_list(arg)?,
                None => Vec::new(),
            },
            clade_match: self.clade_match.into(),
            most_abundant: self.most_abundant,
            least_biomarkers: self.least_biomarkers,
        })
    }
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&format!("{{spinner:.{}}} {{msg}}", color))
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg);
    spinner
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.to_config()?;

    // 1. Load inputs and synthesize annotations
    let bar = spinner("green", "Building tree and annotations...");
    let results = export_annotations(config);
    bar.finish_and_clear();
    let results = results?;

    // 2. Write outputs
    let bar = spinner("yellow", "Writing output files...");
    let tree_written = results.write_tree(&cli.tree);
    let annotation_written = results.write_annotation(&cli.annotation);
    bar.finish_with_message("Output files created.");

    // 3. Everything we recovered from, in one place
    results.report_warnings();
    tree_written?;
    annotation_written?;

    log::info!(
        "wrote {} lineages to {} and {} annotation lines to {}",
        results.taxa.len(),
        cli.tree.display(),
        results.annotations.len(),
        cli.annotation.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
