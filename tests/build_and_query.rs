use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use spimi::index::{LinkGraph, PageRankScores};
use spimi::{
    DocId, IndexBackend, IndexConfig, IndexError, IndexStore, Indexer, Query, QueryEvaluator,
    QueryType, RankingType, SearchOutcome, Tokenizer, TokenizerConfig,
};

/// Counts WARN events
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn build(config: IndexConfig, docs: &[&str]) -> IndexStore {
    let mut indexer = Indexer::new(config).unwrap();
    for (i, text) in docs.iter().enumerate() {
        indexer.index_text(format!("/corpus/d{}.txt", i), text).unwrap();
    }
    indexer.finish().unwrap()
}

fn disk(root: &Path, budget: usize) -> IndexConfig {
    IndexConfig::new(root).with_memory_budget(budget)
}

fn ids(outcome: &SearchOutcome) -> Vec<u32> {
    outcome.doc_ids().into_iter().map(DocId::as_u32).collect()
}

const CORPUS: &[&str] = &[
    "the quick brown fox jumps over the lazy dog",
    "a quick brown dog outpaces a quick red fox",
    "lazy afternoons suit the lazy dog",
    "foxes and dogs are not the same animal",
    "the brown fox and the brown dog",
];

#[test]
fn spill_budget_does_not_change_the_index() {
    let tmp = TempDir::new().unwrap();
    let roots: Vec<_> = [1usize, 3, 7, 1_000_000]
        .iter()
        .map(|&budget| {
            let root = tmp.path().join(format!("budget-{}", budget));
            build(disk(&root, budget), CORPUS);
            root
        })
        .collect();

    let reference = fs::read(roots[3].join("full-index")).unwrap();
    let reference_dir = fs::read(roots[3].join("term-index")).unwrap();
    for root in &roots[..3] {
        assert_eq!(fs::read(root.join("full-index")).unwrap(), reference);
        assert_eq!(fs::read(root.join("term-index")).unwrap(), reference_dir);
    }
}

#[test]
fn memory_and_disk_backends_agree() {
    let tmp = TempDir::new().unwrap();
    let on_disk = build(disk(&tmp.path().join("disk"), 4), CORPUS);
    let in_memory = build(
        IndexConfig::new(tmp.path().join("mem")).with_backend(IndexBackend::Memory),
        CORPUS,
    );

    assert_eq!(on_disk.terms(), in_memory.terms());
    for term in on_disk.terms() {
        let a = on_disk.lookup(&term).unwrap().unwrap();
        let b = in_memory.lookup(&term).unwrap().unwrap();
        assert_eq!(a, b, "postings differ for '{}'", term);
        assert!(a.is_well_formed());
    }
}

#[test]
fn rebuilding_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    build(disk(&a, 5), CORPUS);
    build(disk(&b, 5), CORPUS);

    for file in ["full-index", "term-index", "docpath-index", "doclength-index"] {
        assert_eq!(
            fs::read(a.join(file)).unwrap(),
            fs::read(b.join(file)).unwrap(),
            "{} differs",
            file
        );
    }
}

#[test]
fn directory_offsets_point_at_records() {
    let tmp = TempDir::new().unwrap();
    let config = disk(tmp.path(), 2);
    let store = build(config.clone(), CORPUS);

    let index = fs::read_to_string(config.index_file()).unwrap();
    assert!(index.ends_with('\n'));

    for line in fs::read_to_string(config.term_directory_file()).unwrap().lines() {
        let (term, offset) = line.rsplit_once(' ').unwrap();
        let offset: usize = offset.parse().unwrap();
        let record = index[offset..].lines().next().unwrap();
        assert_eq!(store.lookup(term).unwrap().unwrap().to_record(), record);
    }
}

#[test]
fn intersection_keeps_common_documents() {
    let tmp = TempDir::new().unwrap();
    // "alpha" in 1,3,5 and "beta" in 3,4,5,6
    let docs = ["x", "alpha", "x", "alpha beta", "beta", "beta alpha", "beta"];
    let store = build(disk(tmp.path(), 3), &docs);
    let evaluator = QueryEvaluator::new(&store);

    let outcome = evaluator
        .search(&Query::parse("alpha beta"), QueryType::Intersection)
        .unwrap();
    assert_eq!(ids(&outcome), vec![3, 5]);

    let single = evaluator
        .search(&Query::parse("beta"), QueryType::Intersection)
        .unwrap();
    assert_eq!(ids(&single), vec![3, 4, 5, 6]);

    let missing = evaluator
        .search(&Query::parse("alpha gamma"), QueryType::Intersection)
        .unwrap();
    assert_eq!(missing, SearchOutcome::NoMatches);
}

#[test]
fn phrase_matches_adjacent_positions() {
    let tmp = TempDir::new().unwrap();
    let docs = ["new york is not new jersey", "york new", "new york new york"];
    let store = build(disk(tmp.path(), 4), &docs);
    let evaluator = QueryEvaluator::new(&store);

    let outcome = evaluator
        .search(&Query::parse("new york"), QueryType::Phrase)
        .unwrap();
    let SearchOutcome::Postings(list) = &outcome else {
        panic!("expected postings, got {:?}", outcome);
    };
    assert_eq!(ids(&outcome), vec![0, 2]);
    assert_eq!(list.entries()[0].offsets, vec![1]);
    assert_eq!(list.entries()[1].offsets, vec![1, 3]);

    assert_eq!(
        evaluator
            .search(&Query::parse("jersey new"), QueryType::Phrase)
            .unwrap(),
        SearchOutcome::NoMatches
    );
    // An unindexed term fails the phrase even though "new" is indexed
    assert_eq!(
        evaluator
            .search(&Query::parse("new amsterdam"), QueryType::Phrase)
            .unwrap(),
        SearchOutcome::NoMatches
    );
}

#[test]
fn tf_idf_prefers_more_occurrences() {
    let tmp = TempDir::new().unwrap();
    let docs = ["zombie zombie film", "zombie film film", "garden tools rake"];
    let store = build(disk(tmp.path(), 100), &docs);

    let outcome = QueryEvaluator::new(&store)
        .search(&Query::parse("zombie"), QueryType::Ranked(RankingType::TfIdf))
        .unwrap();
    let hits = outcome.hits();
    assert_eq!(ids(&outcome), vec![0, 1]);
    assert!(hits[0].score > hits[1].score);

    // idf = log10(3/2), doc length 3
    let idf = (3.0f64 / 2.0).log10();
    assert!((hits[0].score - 2.0 * idf * idf / 3.0).abs() < 1e-12);
}

#[test]
fn tf_idf_does_not_drop_when_a_document_repeats_the_term() {
    let tmp = TempDir::new().unwrap();
    let others = ["zombie garden tools", "garden tools rake", "film rake tools"];

    // Doc 0 keeps five tokens while "zombie" replaces filler words, so df,
    // N and every other document stay the same between builds
    let mut previous: Option<(f64, f64)> = None;
    for tf in 1..=4 {
        let mut words = vec!["zombie"; tf];
        words.extend(std::iter::repeat("film").take(5 - tf));
        let first = words.join(" ");

        let mut docs = vec![first.as_str()];
        docs.extend(others);
        let store = build(disk(&tmp.path().join(format!("tf-{}", tf)), 3), &docs);

        let hits = QueryEvaluator::new(&store)
            .search(&Query::parse("zombie"), QueryType::Ranked(RankingType::TfIdf))
            .unwrap()
            .hits();
        let score = |doc: u32| {
            hits.iter()
                .find(|h| h.doc_id == DocId(doc))
                .map(|h| h.score)
                .unwrap()
        };

        let (doc0, doc1) = (score(0), score(1));
        if let Some((prev0, prev1)) = previous {
            assert!(doc0 > prev0, "tf {} scored {} after {}", tf, doc0, prev0);
            assert!((doc1 - prev1).abs() < 1e-12);
        }
        previous = Some((doc0, doc1));
    }
}

#[test]
fn query_weights_scale_tf_idf() {
    let tmp = TempDir::new().unwrap();
    let docs = ["zombie zombie film", "zombie film film", "garden tools rake"];
    let store = build(disk(tmp.path(), 100), &docs);
    let evaluator = QueryEvaluator::new(&store);

    let plain = evaluator
        .search(&Query::parse("film"), QueryType::Ranked(RankingType::TfIdf))
        .unwrap();
    let boosted = evaluator
        .search(
            &Query::parse("film").with_weight("film", 2.0),
            QueryType::Ranked(RankingType::TfIdf),
        )
        .unwrap();
    for (a, b) in plain.hits().iter().zip(boosted.hits()) {
        assert!((b.score - 2.0 * a.score).abs() < 1e-12);
    }
}

#[test]
fn pagerank_ranks_union_and_warns_on_missing_scores() {
    let tmp = TempDir::new().unwrap();
    // "pear" in 1,2 and "quince" in 2,3
    let docs = ["apple", "pear", "pear quince", "quince"];
    let store = build(disk(tmp.path(), 100), &docs)
        .with_authority(PageRankScores::new().with_score("d1", 0.2).with_score("d3", 0.5));

    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

    let outcome = tracing::subscriber::with_default(subscriber, || {
        QueryEvaluator::new(&store)
            .search(
                &Query::parse("pear quince"),
                QueryType::Ranked(RankingType::PageRank),
            )
            .unwrap()
    });

    assert_eq!(ids(&outcome), vec![3, 1, 2]);
    let hits = outcome.hits();
    assert_eq!(hits[2].score, 0.0);
    assert_eq!(warnings.load(Ordering::SeqCst), 1);
}

#[test]
fn combination_adds_weighted_pagerank() {
    let tmp = TempDir::new().unwrap();
    let docs = ["zombie zombie film", "zombie film film", "garden tools rake"];
    let store = build(disk(tmp.path(), 100), &docs)
        .with_authority(PageRankScores::new().with_score("d0", 0.0).with_score("d1", 0.01));
    let evaluator = QueryEvaluator::new(&store);

    let cosine = evaluator
        .search(&Query::parse("zombie"), QueryType::Ranked(RankingType::TfIdf))
        .unwrap()
        .hits();
    let combined = evaluator
        .search(&Query::parse("zombie"), QueryType::Ranked(RankingType::Combination))
        .unwrap();

    assert_eq!(ids(&combined), vec![1, 0]);
    let doc1_cosine = cosine.iter().find(|h| h.doc_id == DocId(1)).unwrap().score;
    assert!((combined.hits()[0].score - (doc1_cosine + 1.0)).abs() < 1e-12);
}

#[test]
fn raw_query_text_is_segmented_like_documents() {
    let tmp = TempDir::new().unwrap();
    let docs = ["The Dog lives in New-York.", "a cat in york"];
    let store = build(disk(tmp.path(), 3), &docs);
    let tokenizer = Tokenizer::new(&TokenizerConfig::default());
    let evaluator = QueryEvaluator::new(&store);

    let query = tokenizer.query("Dog, new-york");
    assert_eq!(query.terms(), &["dog", "new", "york"]);
    assert_eq!(
        ids(&evaluator.search(&query, QueryType::Intersection).unwrap()),
        vec![0]
    );
    assert_eq!(
        ids(&evaluator
            .search(&tokenizer.query("NEW-YORK!"), QueryType::Phrase)
            .unwrap()),
        vec![0]
    );
}

#[test]
fn unknown_terms_yield_no_matches() {
    let tmp = TempDir::new().unwrap();
    let store = build(disk(tmp.path(), 100), CORPUS);
    let evaluator = QueryEvaluator::new(&store);

    for query_type in [
        QueryType::Intersection,
        QueryType::Phrase,
        QueryType::Ranked(RankingType::TfIdf),
        QueryType::Ranked(RankingType::PageRank),
        QueryType::Ranked(RankingType::Combination),
    ] {
        assert_eq!(
            evaluator.search(&Query::parse("zeppelin"), query_type).unwrap(),
            SearchOutcome::NoMatches
        );
    }
    assert_eq!(
        evaluator
            .search(&Query::new(), QueryType::Intersection)
            .unwrap(),
        SearchOutcome::NoMatches
    );
}

#[test]
fn reopened_index_answers_the_same() {
    let tmp = TempDir::new().unwrap();
    let config = disk(tmp.path(), 6);
    let built = build(config.clone(), CORPUS);
    let query = Query::parse("brown dog");
    let expected = QueryEvaluator::new(&built)
        .search(&query, QueryType::Ranked(RankingType::TfIdf))
        .unwrap();
    drop(built);

    let opened = IndexStore::open(&config).unwrap();
    assert_eq!(opened.doc_count(), CORPUS.len());
    let actual = QueryEvaluator::new(&opened)
        .search(&query, QueryType::Ranked(RankingType::TfIdf))
        .unwrap();
    assert_eq!(actual, expected);
    assert_eq!(opened.document_path(DocId(2)), Some(Path::new("/corpus/d2.txt")));
}

#[test]
fn reopened_index_loads_pagerank_file() {
    let tmp = TempDir::new().unwrap();
    let config = disk(tmp.path(), 6);
    build(config.clone(), CORPUS);
    fs::write(config.pagerank_file(), "d4 0.3\nd0 0.1\n").unwrap();

    let opened = IndexStore::open(&config).unwrap();
    assert_eq!(opened.pagerank_score(DocId(4)), 0.3);
    assert_eq!(opened.pagerank_score(DocId(0)), 0.1);
}

#[test]
fn computed_pagerank_orders_reopened_index() {
    let tmp = TempDir::new().unwrap();
    let config = disk(tmp.path(), 6);
    build(config.clone(), CORPUS);

    let links = "d0;d2\nd1;d2,d0\nd2;d4\nd3;d2\nd4;d2\n";
    let graph = LinkGraph::read(links.as_bytes(), "links").unwrap();
    let scores = graph.scores(&config.pagerank, &Default::default());
    scores.save(&config.pagerank_file()).unwrap();

    let opened = IndexStore::open(&config).unwrap();
    let outcome = QueryEvaluator::new(&opened)
        .search(&Query::parse("dog"), QueryType::Ranked(RankingType::PageRank))
        .unwrap();

    // d3 only mentions "dogs"; d2 collects most links, d4 is its only target
    assert_eq!(ids(&outcome), vec![2, 4, 0, 1]);
    let top = outcome.hits()[0].score;
    assert!((top - scores.top(1)[0].1).abs() < 1e-12);
}

#[test]
fn open_without_index_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(
        IndexStore::open(&IndexConfig::new(tmp.path())),
        Err(IndexError::IndexNotFound(_))
    ));
}

#[test]
fn concurrent_lookups_share_one_store() {
    let tmp = TempDir::new().unwrap();
    let store = build(disk(tmp.path(), 3), CORPUS);
    let terms = store.terms();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let store = &store;
            let terms = &terms;
            scope.spawn(move || {
                for term in terms.iter().skip(worker).step_by(2) {
                    let postings = store.lookup(term).unwrap().unwrap();
                    assert!(!postings.is_empty());
                    QueryEvaluator::new(store)
                        .search(&Query::parse(term), QueryType::Ranked(RankingType::TfIdf))
                        .unwrap();
                }
            });
        }
    });
}

#[test]
fn directory_build_indexes_files_in_name_order() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("b.txt"), "second document").unwrap();
    fs::write(docs.join("a.txt"), "first document").unwrap();

    let config = disk(&tmp.path().join("index"), 2);
    let mut indexer = Indexer::new(config).unwrap();
    assert_eq!(indexer.index_directory(&docs).unwrap(), 2);
    let store = indexer.finish().unwrap();

    let outcome = QueryEvaluator::new(&store)
        .search(&Query::parse("first"), QueryType::Intersection)
        .unwrap();
    assert_eq!(ids(&outcome), vec![0]);
    assert_eq!(store.document_path(DocId(0)), Some(docs.join("a.txt").as_path()));
}
