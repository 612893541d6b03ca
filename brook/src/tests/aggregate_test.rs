use super::*;
use crate::{
    broker::{NewTopicSpec, OutgoingRecord, Publisher},
    topics::{ensure_topics, retain_existing},
};

const SHOP: &str = "naver-shop-results";

fn product(offset: i64, ingredient: &str, id: &str, price: &str) -> RawRecord {
    json_record(
        SHOP,
        offset,
        &format!(
            r#"{{"ingredient":"{ingredient}","productId":"{id}","title":"{ingredient} {id}","lprice":"{price}"}}"#
        ),
    )
}

fn price_config() -> ReducerConfig {
    ReducerConfig::group_by(KeySource::field("ingredient"))
        .rank_by(KeySource::field("productId"), KeySource::field("lprice"), 5)
        .label(KeySource::field("title"))
}

#[test]
fn duplicate_identity_keeps_higher_score() {
    let records = [
        product(0, "butter", "p-100", "100"),
        product(1, "butter", "p-300", "300"),
        product(2, "butter", "p-300", "50"),
    ]
    .into_iter()
    .map(decode);

    let summary = aggregate(records, price_config());

    let bucket = summary.bucket("butter").unwrap();
    assert_eq!(bucket.count, 3);
    let top: Vec<(&str, f64)> = bucket
        .top_items
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.score))
        .collect();
    assert_eq!(top, [("p-300", 300.0), ("p-100", 100.0)]);
}

#[test]
fn raw_wrapped_values_fall_into_sentinel() {
    let records = [
        json_record(SHOP, 0, "<html>502</html>"),
        product(1, "cocoa", "p-1", "2500"),
    ]
    .into_iter()
    .map(decode);

    let summary = aggregate(
        records,
        price_config().sentinel("미분류"),
    );

    assert_eq!(summary.total, 2);
    assert_eq!(summary.bucket("미분류").unwrap().count, 1);
    assert!(summary.bucket("미분류").unwrap().top_items.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn summarize_folds_session_stream(broker: MemoryBroker) {
    let prices = [
        ("butter", "p-1", "4200"),
        ("butter", "p-2", "3900"),
        ("pistachio", "p-3", "12000"),
        ("butter", "p-1", "4500"),
        ("marshmallow", "p-4", "1800"),
    ];
    for (i, (ingredient, id, price)) in prices.into_iter().enumerate() {
        broker.schedule(
            Duration::from_millis(100 * i as u64),
            product(i as i64, ingredient, id, price),
        );
    }
    let ids = SequenceIds::default();
    let configs = vec![
        price_config(),
        ReducerConfig::group_by(KeySource::Topic),
    ];

    let result = summarize(&broker, &ids, request(&[SHOP], 4, 5000), configs)
        .await
        .unwrap();

    assert_eq!(result.total, 4);
    assert_eq!(result.trigger, Trigger::Threshold);
    assert_eq!(result.summaries.len(), 2);
    let by_ingredient = &result.summaries[0];
    let butter = by_ingredient.bucket("butter").unwrap();
    assert_eq!(butter.count, 3);
    assert_eq!(butter.top_items.len(), 2);
    assert_eq!(butter.top_items.items()[0].score, 4500.0);
    assert_eq!(butter.score_stats.max, 4500.0);
    assert!(by_ingredient.bucket("marshmallow").is_none());
    assert_eq!(by_ingredient.ranked()[0].group_key, "butter");
    assert_eq!(result.summaries[1].bucket(SHOP).unwrap().count, 4);
    assert_eq!(broker.open_subscriptions(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn summarize_keeps_tables_per_topic(broker: MemoryBroker) {
    const GOOGLE: &str = "google-search-results";
    const YOUTUBE: &str = "youtube-search-results";
    let values = [
        (GOOGLE, r#"{"category":"dessert","keyword":"두바이 쫀득쿠키"}"#),
        (YOUTUBE, r#"{"category":"dessert","keyword":"버터떡","video":{"videoId":"v1","title":"버터떡 만들기"},"statistics":{"viewCount":"52000"}}"#),
        (GOOGLE, r#"{"category":"cafe","keyword":"버터떡"}"#),
        (YOUTUBE, r#"{"category":"dessert","keyword":"두바이 쫀득쿠키","video":{"videoId":"v2","title":"쫀득쿠키 먹방"},"statistics":{"viewCount":"1520000"}}"#),
        (YOUTUBE, r#"{"category":"dessert","keyword":"버터떡","video":{"videoId":"v1","title":"버터떡 만들기"},"statistics":{"viewCount":"53000"}}"#),
        (GOOGLE, r#"{"keyword":"피스타치오"}"#),
    ];
    for (i, (topic, value)) in values.into_iter().enumerate() {
        broker.schedule(
            Duration::from_millis(100 * i as u64),
            json_record(topic, i as i64, value),
        );
    }
    let ids = SequenceIds::default();
    let configs = vec![
        ReducerConfig::group_by(KeySource::field("category")).topics([GOOGLE]),
        ReducerConfig::group_by(KeySource::field("keyword")).topics([GOOGLE]),
        ReducerConfig::group_by(KeySource::field("category")).topics([YOUTUBE]),
        ReducerConfig::group_by(KeySource::Topic)
            .topics([YOUTUBE])
            .rank_by(
                KeySource::field("video.videoId"),
                KeySource::field("statistics.viewCount"),
                10,
            )
            .label(KeySource::field("video.title")),
    ];

    let result = summarize(&broker, &ids, request(&[GOOGLE, YOUTUBE], 10, 2000), configs)
        .await
        .unwrap();

    assert_eq!(result.total, 6);
    let [google_category, google_keyword, youtube_category, youtube_views] =
        result.summaries.as_slice()
    else {
        panic!("预期四个汇总，实际为 {}", result.summaries.len());
    };
    assert_eq!(google_category.total, 3);
    assert_eq!(google_category.bucket("dessert").unwrap().count, 1);
    assert_eq!(google_category.bucket("unknown").unwrap().count, 1);
    assert_eq!(google_keyword.bucket("버터떡").unwrap().count, 1);
    assert_eq!(youtube_category.total, 3);
    assert_eq!(youtube_category.bucket("dessert").unwrap().count, 3);
    assert!(youtube_category.bucket("cafe").is_none());
    let videos: Vec<(&str, f64)> = youtube_views
        .bucket(YOUTUBE)
        .unwrap()
        .top_items
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.score))
        .collect();
    assert_eq!(videos, [("v2", 1_520_000.0), ("v1", 53_000.0)]);
    assert!(youtube_views.bucket(GOOGLE).is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn summarize_on_silent_topic_is_empty(broker: MemoryBroker) {
    let ids = SequenceIds::default();

    let result = summarize(&broker, &ids, request(&[SHOP], 10, 800), vec![price_config()])
        .await
        .unwrap();

    assert_eq!(result.total, 0);
    assert_eq!(result.trigger, Trigger::Deadline);
    assert!(result.summaries[0].buckets.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn published_records_round_through_session(broker: MemoryBroker) {
    broker.register_topic(SHOP, 6);
    let records = [
        OutgoingRecord::new(r#"{"ingredient":"butter","productId":"p-1","lprice":"4200"}"#)
            .key("butter")
            .header("query", "butter")
            .header("searchType", "shop"),
        OutgoingRecord::new(r#"{"ingredient":"cocoa","productId":"p-2","lprice":"2500"}"#)
            .key("cocoa")
            .header("query", "cocoa")
            .header("searchType", "shop"),
    ];

    let deliveries = broker.publish(SHOP, &records).await.unwrap();
    let ids = SequenceIds::default();
    let result = consume(
        &broker,
        &ids,
        request(&[SHOP], 10, 300)
            .from_beginning(true)
            .filter(HeaderFilter::new().contains("query", "cocoa")),
    )
    .await
    .unwrap();

    assert_eq!(deliveries.iter().map(|d| d.offset).collect::<Vec<_>>(), [0, 1]);
    assert_eq!(result.count, 1);
    assert_eq!(result.records[0].key.as_deref(), Some("cocoa"));
    assert_eq!(result.records[0].header("searchType"), Some("shop"));
}

#[rstest]
#[tokio::test]
async fn topic_helpers(broker: MemoryBroker) {
    broker.register_topic("google-search-results", 6);
    let specs = [
        NewTopicSpec::new("google-search-results", 6, 3),
        NewTopicSpec::new("naver-datalab-trends", 6, 3).config("retention.ms", "604800000"),
    ];

    let created = ensure_topics(&broker, &specs).await.unwrap();
    let present = retain_existing(
        &broker,
        &[
            "naver-datalab-trends".to_owned(),
            "missing".to_owned(),
            "google-search-results".to_owned(),
        ],
    )
    .await
    .unwrap();

    assert_eq!(created, ["naver-datalab-trends"]);
    assert_eq!(present, ["naver-datalab-trends", "google-search-results"]);
}
