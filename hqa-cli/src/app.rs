//! Builds the shared handles from [`Settings`] and runs one subcommand.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use hqa_eval::{
    ChunkedEvaluator, IntervalLimiter, LlmJudgeScorer, answer_testset, load_records, metric_means,
    save_records, unanswered, validate_answers,
};
use hqa_model::{EnvProviderFactory, ProviderFactory, ProviderKind};
use hqa_rag::{
    CohereReranker, CollectionRegistry, EmbeddingBackend, EmbeddingProvider, HybridSearcher,
    HybridStore, LlmOverrides, OpenAIEmbeddingProvider, PassthroughReranker, QaChain, Reranker,
    RerankerKind, Settings, SparseEncoder, TermFrequencyEncoder,
};
use tracing::{info, warn};

use crate::cli::{AskArgs, Cli, CollectionsAction, Command, EvaluateArgs, IngestArgs};

/// Settings from `path`, or the defaults plus environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => {
            let settings = Settings::default().with_env_overrides();
            settings.validate()?;
            settings
        }
    };
    Ok(settings)
}

fn embedders(
    settings: &Settings,
    http: &reqwest::Client,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn SparseEncoder>)> {
    match settings.qdrant.embedding_backend {
        EmbeddingBackend::Openai => {
            let (api_key, base_url) = settings.providers.openai.resolve()?;
            let dense = OpenAIEmbeddingProvider::new(api_key, &base_url, http.clone())?
                .with_model(settings.qdrant.dense_model.as_str());
            Ok((Arc::new(dense), Arc::new(TermFrequencyEncoder)))
        }
        EmbeddingBackend::Fastembed => local_embedders(settings),
    }
}

#[cfg(feature = "fastembed")]
fn local_embedders(settings: &Settings) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn SparseEncoder>)> {
    use hqa_rag::fastembed::{FastembedDense, FastembedSparse};

    let dense = FastembedDense::new(&settings.qdrant.dense_model)?;
    let sparse = FastembedSparse::new(&settings.qdrant.sparse_model)?;
    Ok((Arc::new(dense), Arc::new(sparse)))
}

#[cfg(not(feature = "fastembed"))]
fn local_embedders(_settings: &Settings) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn SparseEncoder>)> {
    bail!("qdrant.embedding_backend 'fastembed' requires building hqa with the `fastembed` feature")
}

#[cfg(feature = "qdrant")]
fn vector_store(settings: &Settings, http: &reqwest::Client) -> Result<Arc<dyn HybridStore>> {
    use hqa_rag::qdrant::QdrantHybridStore;

    let (dense, sparse) = embedders(settings, http)?;
    let store = QdrantHybridStore::new(&settings.qdrant.url, dense, sparse)?
        .with_on_disk_payload(settings.qdrant.on_disk_payload);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "qdrant"))]
fn vector_store(settings: &Settings, http: &reqwest::Client) -> Result<Arc<dyn HybridStore>> {
    let _ = embedders(settings, http)?;
    bail!("no vector store backend compiled in; build hqa with the `qdrant` feature")
}

/// The reranker selected by `reranker.kind`.
pub fn reranker(settings: &Settings, http: &reqwest::Client) -> Result<Arc<dyn Reranker>> {
    match settings.reranker.kind {
        RerankerKind::None => Ok(Arc::new(PassthroughReranker)),
        RerankerKind::Cohere => {
            let (api_key, base_url) = settings.providers.cohere.resolve()?;
            let reranker = CohereReranker::new(api_key, base_url, settings.reranker.model.as_str(), http.clone())?;
            Ok(Arc::new(reranker))
        }
        RerankerKind::CrossEncoder => cross_encoder(settings),
    }
}

#[cfg(feature = "fastembed")]
fn cross_encoder(settings: &Settings) -> Result<Arc<dyn Reranker>> {
    use hqa_rag::CrossEncoderReranker;
    use hqa_rag::fastembed::FastembedCrossEncoder;

    let model = &settings.reranker.model;
    let encoder = FastembedCrossEncoder::new(model)?;
    Ok(Arc::new(CrossEncoderReranker::new(Arc::new(encoder), model.as_str())))
}

#[cfg(not(feature = "fastembed"))]
fn cross_encoder(_settings: &Settings) -> Result<Arc<dyn Reranker>> {
    bail!("reranker.kind 'cross_encoder' requires building hqa with the `fastembed` feature")
}

/// Long-lived handles shared by every subcommand.
struct Handles {
    settings: Settings,
    http: reqwest::Client,
    store: Arc<dyn HybridStore>,
}

impl Handles {
    fn new(settings: Settings) -> Result<Self> {
        let http = hqa_model::config::http_client(settings.http.timeout())?;
        let store = vector_store(&settings, &http)?;
        Ok(Self { settings, http, store })
    }

    async fn registry(&self) -> Result<CollectionRegistry> {
        let registry =
            CollectionRegistry::load(self.settings.registry_path.clone(), self.store.clone(), self.settings.qdrant.chunk_size)
                .await?;
        Ok(registry)
    }

    fn factory(&self) -> Result<Arc<EnvProviderFactory>> {
        Ok(Arc::new(EnvProviderFactory::new(self.settings.provider_credentials())?))
    }

    fn chain(&self) -> Result<QaChain> {
        let searcher = HybridSearcher::builder()
            .store(self.store.clone())
            .reranker(reranker(&self.settings, &self.http)?)
            .limits_from(&self.settings.qdrant)
            .build()?;
        Ok(QaChain::new(Arc::new(searcher), self.settings.llm.clone(), self.factory()?))
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    let ctx = Handles::new(settings)?;
    match cli.command {
        Command::Collections { action } => collections(&ctx, action).await,
        Command::Ingest(args) => ingest(&ctx, args).await,
        Command::Ask(args) => ask(&ctx, args).await,
        Command::Evaluate(args) => evaluate(&ctx, args).await,
    }
}

async fn collections(ctx: &Handles, action: CollectionsAction) -> Result<()> {
    let registry = ctx.registry().await?;
    match action {
        CollectionsAction::List => {
            for name in registry.get_collections().await {
                println!("{name}");
            }
        }
        CollectionsAction::Create { name } => {
            registry.create_collection(&name).await?;
            println!("created collection '{name}'");
        }
        CollectionsAction::Delete { name } => {
            registry.delete_collection(&name).await?;
            println!("deleted collection '{name}'");
        }
        CollectionsAction::Files { name } => {
            for file in registry.get_collection_files(&name).await? {
                println!("{file}");
            }
        }
        CollectionsAction::Reconcile => {
            let report = registry.reconcile().await?;
            if report.is_consistent() {
                println!("registry and store agree");
            }
            for name in &report.missing_in_store {
                println!("registered but missing in store: {name}");
            }
            for name in &report.untracked_in_store {
                println!("in store but not registered: {name}");
            }
        }
    }
    Ok(())
}

async fn ingest(ctx: &Handles, args: IngestArgs) -> Result<()> {
    let registry = ctx.registry().await?;
    let added = registry
        .add_data_to_collection(&args.collection, &args.files, &args.text_field, &args.metadata_fields, args.chunk_size)
        .await?;
    println!("indexed {added} passages into '{}'", args.collection);
    Ok(())
}

async fn ask(ctx: &Handles, args: AskArgs) -> Result<()> {
    let chain = ctx.chain()?;
    let overrides = LlmOverrides { prompt: args.prompt, model: args.model, provider: args.provider };
    let result = chain.qa_chain(&args.collection, &args.question, &overrides).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.answer);
    }
    Ok(())
}

async fn evaluate(ctx: &Handles, args: EvaluateArgs) -> Result<()> {
    let eval = &ctx.settings.eval;
    let metrics = if args.metrics.is_empty() { eval.metrics.clone() } else { args.metrics };
    let chunks = args.chunks.unwrap_or(eval.chunks_amount);
    let pacing = Duration::from_secs(args.pacing_secs.unwrap_or(eval.pacing_secs));

    let mut records = load_records(&args.testset)?;
    info!(rows = records.len(), testset = %args.testset.display(), "loaded test set");

    if !args.skip_answering {
        let Some(collection) = args.collection.as_deref() else {
            bail!("--collection is required unless --skip-answering is set");
        };
        records = answer_testset(&ctx.chain()?, collection, records).await?;
    }

    let judge_kind: ProviderKind = eval.judge_provider.parse()?;
    let judge = ctx.factory()?.create(judge_kind, &eval.judge_model)?;

    if args.critic {
        let report = validate_answers(records, judge.clone()).await;
        println!("critic revised {} of {} answers", report.revised, report.records.len());
        if report.failed > 0 {
            warn!(failed = report.failed, "critic could not check every answer; those answers are unchanged");
        }
        records = report.records;
    }

    let missing = unanswered(&records);
    if missing > 0 {
        warn!(
            missing,
            total = records.len(),
            no_answer = %eval.no_answer,
            "rows without an answer are scored as the no-answer text"
        );
    }
    let evaluator = ChunkedEvaluator::new(Arc::new(LlmJudgeScorer::new(judge)), Arc::new(IntervalLimiter::new(pacing)))
        .with_no_answer(eval.no_answer.as_str());
    let scored = evaluator.evaluate_in_chunks(records, &metrics, chunks).await?;

    save_records(&args.output, &scored)?;
    println!("wrote {} scored rows to {}", scored.len(), args.output.display());
    for (metric, mean) in metric_means(&scored, &metrics) {
        println!("{metric}: {mean:.3}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_file_is_overlaid_onto_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reranker:\n  kind: none\nqdrant:\n  search_limit: 20").unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.reranker.kind, RerankerKind::None);
        assert_eq!(settings.qdrant.search_limit, 20);
        assert_eq!(settings.qdrant.reranker_limit, 5);
    }

    #[test]
    fn inconsistent_limits_are_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "qdrant:\n  search_limit: 2\n  reranker_limit: 4").unwrap();
        assert!(load_settings(Some(file.path())).is_err());
    }

    #[test]
    fn missing_settings_file_is_reported_with_its_path() {
        let err = load_settings(Some(Path::new("/nonexistent/hqa.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hqa.yaml"));
    }

    #[test]
    fn reranker_kind_none_is_passthrough() {
        let mut settings = Settings::default();
        settings.reranker.kind = RerankerKind::None;
        let http = reqwest::Client::new();
        assert_eq!(reranker(&settings, &http).unwrap().name(), "none");
    }

    #[cfg(not(feature = "fastembed"))]
    #[test]
    fn cross_encoder_needs_the_fastembed_feature() {
        let mut settings = Settings::default();
        settings.reranker.kind = RerankerKind::CrossEncoder;
        let err = reranker(&settings, &reqwest::Client::new()).err().unwrap();
        assert!(err.to_string().contains("fastembed"));
    }
}
