use clap::Parser;
use schemalens_lib::ai::RecordExt;
use schemalens_lib::commands::{self, AnalyzeRequest, DatabaseReport};
use schemalens_lib::{logging, Settings};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "schemalens")]
#[command(about = "Reverse-engineer a database into business and architecture reports", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (.db, .sqlite, .sqlite3, .json, .csv) or postgres:// URL
    database: Option<String>,

    /// Name used for output files
    #[arg(short, long)]
    name: Option<String>,

    /// Free-text description passed to the analysis
    #[arg(short, long)]
    description: Option<String>,

    /// Analyze every matching file in this directory
    #[arg(long, value_name = "DIR", conflicts_with = "database")]
    batch: Option<PathBuf>,

    /// Glob used with --batch
    #[arg(long, default_value = "*.db")]
    pattern: String,

    /// List available database files and exit
    #[arg(long)]
    list: bool,

    /// Skip chart generation
    #[arg(long)]
    no_graphs: bool,

    /// Keep intermediate analysis files
    #[arg(long)]
    no_cleanup: bool,

    /// Settings file (defaults to ./schemalens.toml when present)
    #[arg(short, long, env = "SCHEMALENS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list {
        list();
        return ExitCode::SUCCESS;
    }

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if cli.no_graphs {
        settings.analysis.generate_charts = false;
    }
    if cli.no_cleanup {
        settings.output.cleanup = false;
    }

    // the log file lives in the output directory, which cleanup removes
    let log_dir = (!settings.output.cleanup).then(|| settings.output.output_dir.clone());
    let _log_guard = match logging::init(cli.verbose, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Failed to initialise logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &cli.batch {
        return batch(&settings, dir, &cli.pattern).await;
    }

    let Some(database) = cli.database else {
        eprintln!("❌ Provide a database path, --batch <DIR> or --list");
        return ExitCode::FAILURE;
    };
    let request = AnalyzeRequest {
        target: database,
        name: cli.name,
        description: cli.description,
    };

    let name = request.source_name();
    println!("🔍 {} Database Analysis", title(&name));
    println!("{}", "=".repeat(60));
    println!("Database: {}", request.target);
    println!("Description: {}", request.description());
    println!("Output Directory: {}", settings.output.output_dir.display());
    println!("Generate Graphs: {}", yes_no(settings.analysis.generate_charts));
    println!("Cleanup Temporary Files: {}", yes_no(settings.output.cleanup));

    match commands::analyze_database(&settings, &request).await {
        Ok(report) => {
            print_summary(&report);
            print_reports(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Analysis failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn batch(settings: &Settings, dir: &std::path::Path, pattern: &str) -> ExitCode {
    println!("🚀 Starting batch analysis of {} in {}", pattern, dir.display());
    match commands::batch_analyze(settings, dir, pattern).await {
        Ok(tally) => {
            println!("\n🎉 Batch analysis complete!");
            println!(
                "✅ Successfully analyzed: {}/{} databases",
                tally.succeeded.len(),
                tally.total
            );
            for (name, reason) in &tally.failed {
                println!("❌ {}: {}", name, reason);
            }
            if tally.succeeded.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list() {
    let found = commands::list_databases();
    if found.is_empty() {
        println!("No database files found in New_DB/ or the current directory");
        return;
    }
    println!("📁 Available databases:");
    for file in found {
        println!("   • {} ({} bytes)", file.path.display(), file.size);
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn title(name: &str) -> String {
    schemalens_lib::report::markdown::title_case(name)
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("   {}", label);
    for item in items {
        println!("     • {}", item);
    }
}

fn print_summary(report: &DatabaseReport) {
    let a: &Value = &report.analysis;
    let re = "reverse_engineering_analysis";
    let domain = "business_domain_identification";
    let arch = "data_model_architecture";

    println!("\n{}", "=".repeat(60));
    println!("📊 {} DATABASE ANALYSIS SUMMARY", report.name.to_uppercase());
    println!("{}", "=".repeat(60));
    println!("Tables analyzed: {}", report.table_count);

    if a.has_section(&[re, domain]) {
        println!("\n🏢 Business Domain: {}", a.text(&[re, domain, "primary_domain"]));
        println!(
            "📈 Confidence: {}%",
            a.number(&[re, domain, "confidence_score"]).unwrap_or(0.0)
        );
        let sub = a.strings(&[re, domain, "sub_domains"]);
        if !sub.is_empty() {
            println!("📂 Sub-domains: {}", sub.join(", "));
        }
        print_list("⚙️  Business Processes:", &a.strings(&[re, domain, "business_processes"]));
    }

    if a.has_section(&[re, arch]) {
        println!("\n🏗️ Architecture Analysis:");
        println!("   📐 Design Pattern: {}", a.text(&[re, arch, "design_pattern"]));
        println!("   🔧 Architectural Style: {}", a.text(&[re, arch, "architectural_style"]));
        println!("   📊 Normalization: {}", a.text(&[re, arch, "normalization_level"]));
        println!(
            "   💪 Flexibility Score: {}/100",
            a.number(&[re, arch, "flexibility_score"]).unwrap_or(0.0)
        );
    }

    let entities = a.list(&[re, "entity_relationship_mapping", "core_entities"]);
    if !entities.is_empty() {
        println!("\n🎪 Core Entities ({} found):", entities.len());
        for entity in entities.iter().take(5) {
            println!(
                "   • {} ({})",
                entity.text(&["entity_name"]),
                entity.text(&["table_name"])
            );
        }
    }

    let integrity = ["data_quality_assessment", "integrity_analysis"];
    if a.has_section(&integrity) {
        println!("\n📊 Data Quality Assessment:");
        println!(
            "   ✅ Referential Integrity: {}",
            a.text(&[integrity[0], integrity[1], "referential_integrity"])
        );
        println!(
            "   🎯 Completeness Score: {}/100",
            a.number(&[integrity[0], integrity[1], "completeness_score"]).unwrap_or(0.0)
        );
    }

    if a.has_section(&["performance_analysis"]) {
        println!("\n⚡ Performance Analysis:");
        print_list("🔍 Query Patterns:", &a.strings(&["performance_analysis", "query_patterns"]));
        print_list("⚠️  Bottlenecks:", &a.strings(&["performance_analysis", "bottleneck_identification"]));
    }

    if a.has_section(&["migration_insights"]) {
        println!("\n🔄 Migration Insights:");
        println!(
            "   📊 Complexity: {}",
            a.text(&["migration_insights", "complexity_assessment"])
        );
        println!(
            "   ⏱️  Effort Estimate: {}",
            a.text(&["migration_insights", "migration_effort"])
        );
    }
}

fn print_reports(report: &DatabaseReport) {
    let Some(paths) = report.export.reports.get(&report.name) else {
        return;
    };
    println!("\n📋 Consolidated Reports for {}:", report.name);
    for path in [&paths.markdown, &paths.json, &paths.html] {
        println!("   📄 {}", path.display());
    }
    if report.cleaned_up {
        println!("\n🧹 Temporary analysis files removed; only consolidated reports remain.");
    }
}
