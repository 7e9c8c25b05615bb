use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;

use crate::api::ProgressFn;
use crate::entities::{LocalFile, UploadUrlInfo};
use crate::error::{upstream_error, Error};
use crate::http::{Request, Transport};

/// Direct PUT uploads to pre-signed object-store URLs, one per file,
/// issued concurrently and joined all-or-nothing: a single failed upload
/// fails the whole batch. Files without a matching URL are skipped. Each
/// completion bumps the aggregate progress, `completed * 100 / total`.
#[tracing::instrument(skip_all, fields(files = files.len()))]
pub async fn upload_batch(
    transport: &Arc<dyn Transport>,
    files: &[LocalFile],
    urls: &[UploadUrlInfo],
    progress: Option<ProgressFn>,
) -> Result<(), Error> {
    let targets: Vec<(&LocalFile, &UploadUrlInfo)> = files
        .iter()
        .filter_map(|file| {
            urls.iter()
                .find(|info| info.filename == file.name)
                .map(|info| (file, info))
        })
        .collect();

    if targets.len() < files.len() {
        tracing::warn!(
            missing = files.len() - targets.len(),
            "some files have no upload url and will be skipped"
        );
    }
    if targets.is_empty() {
        return Ok(());
    }

    let total = targets.len();
    let completed = AtomicUsize::new(0);

    let puts = targets.into_iter().map(|(file, info)| {
        let completed = &completed;
        let progress = progress.clone();
        async move {
            let request = Request::put_raw(
                &info.url,
                file.bytes.clone(),
                file.content_type_or_default(),
                Some("max-age=7200"),
            );

            let response = transport.send(request).await?;
            if !response.is_success() {
                tracing::warn!(filename = %file.name, status = response.status, "upload rejected");
                return Err(upstream_error());
            }

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &progress {
                progress((done * 100 / total) as u32);
            }
            Ok(())
        }
    });

    try_join_all(puts).await?;
    Ok(())
}

#[cfg(test)]
struct FlakyStore {
    fail_on: Option<&'static str>,
    puts: AtomicUsize,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Transport for FlakyStore {
    async fn send(&self, request: Request) -> Result<crate::http::Response, Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .fail_on
            .map(|marker| request.url.contains(marker))
            .unwrap_or(false);

        Ok(crate::http::Response {
            status: if failed { 403 } else { 200 },
            body: serde_json::Value::Null,
        })
    }
}

#[cfg(test)]
fn batch(names: &[&str]) -> (Vec<LocalFile>, Vec<UploadUrlInfo>) {
    let files = names
        .iter()
        .map(|name| LocalFile {
            name: (*name).into(),
            content_type: Some("image/jpeg".into()),
            bytes: vec![1, 2, 3],
        })
        .collect();
    let urls = names
        .iter()
        .map(|name| UploadUrlInfo {
            filename: (*name).into(),
            url: format!("https://bucket.example.com/{}", name),
        })
        .collect();
    (files, urls)
}

#[test]
fn progress_reaches_100_only_when_every_file_completed() {
    use tokio_test::block_on;

    let store: Arc<dyn Transport> = Arc::new(FlakyStore {
        fail_on: None,
        puts: AtomicUsize::new(0),
    });
    let (files, urls) = batch(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |pct| sink.lock().unwrap().push(pct));

    block_on(upload_batch(&store, &files, &urls, Some(progress))).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert_eq!(*seen.last().unwrap(), 100);
    assert!(seen.iter().rev().skip(1).all(|pct| *pct < 100));
}

#[test]
fn one_failed_put_fails_the_batch() {
    use tokio_test::block_on;

    let flaky = Arc::new(FlakyStore {
        fail_on: Some("b.jpg"),
        puts: AtomicUsize::new(0),
    });
    let store: Arc<dyn Transport> = flaky.clone();
    let (files, urls) = batch(&["a.jpg", "b.jpg", "c.jpg"]);

    assert!(block_on(upload_batch(&store, &files, &urls, None)).is_err());
    assert!(flaky.puts.load(Ordering::SeqCst) >= 1);
}

#[test]
fn files_without_a_url_are_skipped() {
    use tokio_test::block_on;

    let flaky = Arc::new(FlakyStore {
        fail_on: None,
        puts: AtomicUsize::new(0),
    });
    let store: Arc<dyn Transport> = flaky.clone();
    let (files, _) = batch(&["a.jpg", "b.jpg"]);
    let (_, urls) = batch(&["a.jpg"]);

    block_on(upload_batch(&store, &files, &urls, None)).unwrap();
    assert_eq!(flaky.puts.load(Ordering::SeqCst), 1);
}
