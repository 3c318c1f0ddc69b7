//! Thread-backed parser pool
//!
//! Tree-sitter parsers hold mutable C state, so each worker thread owns one
//! and serves parse requests over a channel. `submit` hands back a receiver,
//! which lets a caller fan a batch of files across the workers and drain the
//! results in submission order.

use crate::languages::LanguageKind;
use crate::source_file::AnalyzerError;
use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex, mpsc};
use tree_sitter::{Parser, Tree};

#[derive(Debug)]
pub struct ParseRequest {
    pub lang: LanguageKind,
    pub content: String,
    pub file_name: String,
}

#[derive(Debug)]
pub struct ParseResult {
    pub tree: Tree,
    pub file_name: String,
    pub content: String,
}

struct WorkerRequest {
    request: ParseRequest,
    response_sender: mpsc::Sender<Result<ParseResult>>,
}

pub struct ParserPool {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for i in 0..num_workers {
            let receiver = receiver.clone();
            std::thread::spawn(move || {
                Self::worker_thread(i, receiver);
            });
        }

        Self { sender }
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkerRequest>>>) {
        tracing::debug!("parser worker {} started", worker_id);

        let mut parser = Parser::new();

        loop {
            let next = match receiver.lock() {
                Ok(guard) => guard.recv(),
                Err(_) => break,
            };
            let WorkerRequest { request, response_sender } = match next {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!("parser worker {} shutting down", worker_id);
                    break;
                }
            };

            let result = Self::parse_one(&mut parser, request);
            if response_sender.send(result).is_err() {
                tracing::warn!("parse result receiver dropped");
            }
        }
    }

    fn parse_one(parser: &mut Parser, request: ParseRequest) -> Result<ParseResult> {
        let rules = request
            .lang
            .rules()
            .ok_or_else(|| anyhow!("no grammar for {:?}", request.lang))?;
        parser
            .set_language(&rules.grammar())
            .map_err(|e| anyhow!("failed to set language: {}", e))?;

        match parser.parse(&request.content, None) {
            Some(tree) => Ok(ParseResult {
                tree,
                file_name: request.file_name,
                content: request.content,
            }),
            None => Err(AnalyzerError::Parse(request.file_name).into()),
        }
    }

    /// Queue a request and return the receiver for its result. Lets callers
    /// submit a whole batch before draining any of it.
    pub fn submit(&self, request: ParseRequest) -> Result<mpsc::Receiver<Result<ParseResult>>> {
        let (response_sender, response_receiver) = mpsc::channel();
        self.sender
            .send(WorkerRequest { request, response_sender })
            .map_err(|_| anyhow!("parser pool is shut down"))?;
        Ok(response_receiver)
    }

    /// Parse one file, blocking the current thread.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParseResult> {
        self.submit(request)?
            .recv()
            .map_err(|_| anyhow!("parser worker died"))?
    }

    /// Parse one file from async context.
    pub async fn parse(&self, request: ParseRequest) -> Result<ParseResult> {
        let receiver = self.submit(request)?;
        tokio::task::spawn_blocking(move || {
            receiver.recv().map_err(|_| anyhow!("parser worker died"))?
        })
        .await
        .map_err(|e| anyhow!("task join error: {}", e))?
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Pool sized to the machine, at least two workers.
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);

    ParserPool::new(num_workers)
}
