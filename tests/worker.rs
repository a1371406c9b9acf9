//! Packing worker integration tests.

use std::time::Duration;

use crossbeam::channel::{self, Receiver};

use bitframe::worker::{
    PackArena, PackFrameRequest, PackingWorker, WorkerMessage, WorkerReply, WorkerRequest,
    pack_with_arena,
};
use bitframe::{BitframeError, PixelBuffer, PixelFormat, codec};

const TIMEOUT: Duration = Duration::from_secs(5);

fn next_reply(inbox: &Receiver<WorkerMessage>) -> WorkerMessage {
    inbox.recv_timeout(TIMEOUT).expect("worker reply")
}

fn ready_worker(id: usize, capacity: usize) -> (PackingWorker, Receiver<WorkerMessage>) {
    let (replies, inbox) = channel::unbounded();
    let worker = PackingWorker::spawn(id, capacity, replies).unwrap();
    worker.init().unwrap();
    let message = next_reply(&inbox);
    assert_eq!(message.worker, id);
    assert!(matches!(message.reply, WorkerReply::Ready));
    (worker, inbox)
}

fn pack_request(pixels: PixelBuffer, frame_index: u64) -> WorkerRequest {
    WorkerRequest::PackFrame(PackFrameRequest::from_pixels(pixels, 128, false, frame_index))
}

#[test]
fn worker_packs_like_the_codec() {
    let (worker, inbox) = ready_worker(3, 1024);
    let pixels = PixelBuffer::new(
        10,
        1,
        PixelFormat::Gray8,
        vec![255, 0, 255, 0, 255, 0, 255, 0, 255, 255],
    )
    .unwrap();
    let expected = codec::pack(&pixels, 128, false);

    worker.send(pack_request(pixels, 42)).unwrap();
    let message = next_reply(&inbox);
    assert_eq!(message.worker, 3);
    match message.reply {
        WorkerReply::FramePacked {
            frame_index,
            packed,
        } => {
            assert_eq!(frame_index, 42);
            assert_eq!(packed, expected);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn worker_replies_in_request_order() {
    let (worker, inbox) = ready_worker(0, 1024);
    for index in 0..10 {
        let pixels = PixelBuffer::filled(8, 1, PixelFormat::Gray8, &[255]).unwrap();
        worker.send(pack_request(pixels, index)).unwrap();
    }
    for expected in 0..10 {
        match next_reply(&inbox).reply {
            WorkerReply::FramePacked { frame_index, .. } => assert_eq!(frame_index, expected),
            other => panic!("unexpected reply {other:?}"),
        }
    }
}

#[test]
fn worker_survives_a_bad_request() {
    let (worker, inbox) = ready_worker(1, 1024);

    let broken = PackFrameRequest {
        frame_data: vec![0; 5],
        pixel_format: PixelFormat::Rgb8,
        width: 2,
        height: 2,
        threshold: 128,
        invert: false,
        frame_index: 9,
    };
    worker.send(WorkerRequest::PackFrame(broken)).unwrap();
    match next_reply(&inbox).reply {
        WorkerReply::Error {
            frame_index,
            message,
        } => {
            assert_eq!(frame_index, Some(9));
            assert!(!message.is_empty());
        }
        other => panic!("unexpected reply {other:?}"),
    }

    let pixels = PixelBuffer::filled(2, 2, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    worker.send(pack_request(pixels, 10)).unwrap();
    assert!(matches!(
        next_reply(&inbox).reply,
        WorkerReply::FramePacked { frame_index: 10, .. }
    ));
}

#[test]
fn worker_without_init_initialises_lazily() {
    let (replies, inbox) = channel::unbounded();
    let worker = PackingWorker::spawn(0, 64, replies).unwrap();
    let pixels = PixelBuffer::filled(8, 2, PixelFormat::Gray8, &[0]).unwrap();
    worker.send(pack_request(pixels, 0)).unwrap();
    assert!(matches!(
        next_reply(&inbox).reply,
        WorkerReply::FramePacked { .. }
    ));
}

#[test]
fn worker_with_zero_arena_reports_init_error() {
    let (replies, inbox) = channel::unbounded();
    let worker = PackingWorker::spawn(2, 0, replies).unwrap();
    worker.init().unwrap();
    match next_reply(&inbox).reply {
        WorkerReply::Error {
            frame_index,
            message,
        } => {
            assert_eq!(frame_index, None);
            assert!(message.contains("arena"), "{message}");
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn dropping_a_worker_closes_its_replies() {
    let (worker, inbox) = ready_worker(0, 64);
    drop(worker);
    assert!(inbox.recv_timeout(TIMEOUT).is_err());
}

// ── Arena ──────────────────────────────────────────────────────────

#[test]
fn arena_must_be_initialised() {
    let mut arena = PackArena::new(16);
    assert!(!arena.is_ready());
    assert!(matches!(
        arena.alloc(1),
        Err(BitframeError::ResourceUnavailable(_))
    ));
    arena.init().unwrap();
    assert!(arena.is_ready());
    assert_eq!(arena.capacity(), 16);
}

#[test]
fn pack_with_arena_reuses_memory() {
    let mut arena = PackArena::new(2);
    arena.init().unwrap();
    let on = PixelBuffer::filled(16, 1, PixelFormat::Gray8, &[255]).unwrap();
    let off = PixelBuffer::filled(16, 1, PixelFormat::Gray8, &[0]).unwrap();

    for _ in 0..3 {
        assert_eq!(pack_with_arena(&mut arena, &on, 128, false).unwrap().as_bytes(), &[0xFF; 2]);
        assert_eq!(pack_with_arena(&mut arena, &off, 128, false).unwrap().as_bytes(), &[0x00; 2]);
    }

    let big = PixelBuffer::filled(24, 1, PixelFormat::Gray8, &[0]).unwrap();
    assert!(matches!(
        pack_with_arena(&mut arena, &big, 128, false),
        Err(BitframeError::ArenaExhausted {
            requested: 3,
            capacity: 2
        })
    ));
}
