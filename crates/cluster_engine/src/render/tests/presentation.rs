//! Frame loop behavior through `RenderContext` over the mock backend

use super::mock_backend::{Event, MockBackend};
use super::recording::Command;
use crate::core::config::RendererConfig;
use crate::render::api::{PresentStatus, Submission};
use crate::render::frame::{PendingSubmission, SlotId, WaitOutcome};
use crate::render::scene::{LightRecord, ObjectRecord, Region, RegionKind, SceneGeometry};
use crate::render::sequencer::{Pass, PassSet};
use crate::render::{RenderContext, VulkanError};

fn context(backend: MockBackend) -> RenderContext<MockBackend> {
    context_with(backend, RendererConfig::default())
}

fn context_with(backend: MockBackend, config: RendererConfig) -> RenderContext<MockBackend> {
    let ctx = RenderContext::with_backend(backend, &config).unwrap();
    ctx.backend().clear_events();
    ctx
}

fn position(events: &[Event], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().position(predicate).expect("event not recorded")
}

fn submissions(events: &[Event]) -> Vec<Submission> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Submit(submission) => Some(*submission),
            _ => None,
        })
        .collect()
}

fn recorded(events: &[Event]) -> Vec<Vec<Command>> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Record { commands, .. } => Some(commands.clone()),
            _ => None,
        })
        .collect()
}

fn triangle_scene() -> (SceneGeometry, Vec<ObjectRecord>, u32) {
    let geometry = SceneGeometry::new(vec![0u8; 36], vec![0u32, 1, 2]);
    let objects = vec![ObjectRecord::new([0.0, 0.0, -5.0], 1.0, 0, 2)];
    (geometry, objects, 2)
}

#[test]
fn test_construction_uploads_an_empty_scene() {
    let ctx = RenderContext::with_backend(MockBackend::default(), &RendererConfig::default()).unwrap();
    let events = ctx.backend().events();
    assert_eq!(events.len(), 1);
    let Event::Upload { layout, in_flight } = &events[0] else {
        panic!("expected an upload, got {:?}", events[0]);
    };
    assert_eq!(*in_flight, [0, 0]);
    assert_eq!(layout.counts().objects, 0);
    assert_eq!(layout.counts().light_capacity, 8);
    assert_eq!(ctx.frame_count(), 0);
}

#[test]
fn test_first_frame_does_not_block() {
    let mut ctx = context(MockBackend::hanging());
    let report = ctx.try_draw_frame().unwrap();

    assert_eq!(report.frame, 0);
    assert_eq!(report.slot, SlotId::new(0));
    assert_eq!(report.wait, WaitOutcome::NeverSubmitted);
    assert_eq!(report.completion_value, 1);

    let events = ctx.backend().events();
    assert!(!events.iter().any(|e| matches!(e, Event::WaitForValue { .. })));
    assert!(matches!(events[0], Event::Acquire { slot: 0, .. }));
    assert!(matches!(events[1], Event::Record { slot: 0, .. }));
    assert!(matches!(events[2], Event::Submit(_)));
    assert!(matches!(events[3], Event::Present { slot: 0, .. }));

    // Let the drop-time shutdown finish
    ctx.backend().recover();
}

#[test]
fn test_slots_alternate_and_reuse_waits_before_recording() {
    let mut ctx = context(MockBackend::default());
    let reports: Vec<_> = (0..3).map(|_| ctx.try_draw_frame().unwrap()).collect();

    let slots: Vec<usize> = reports.iter().map(|r| r.slot.index()).collect();
    assert_eq!(slots, vec![0, 1, 0]);
    assert_eq!(reports[1].wait, WaitOutcome::NeverSubmitted);
    assert_eq!(reports[2].wait, WaitOutcome::Waited { value: 1 });
    assert_eq!(reports[2].completion_value, 2);

    let events = ctx.backend().events();
    let wait = position(&events, |e| *e == Event::WaitForValue { slot: 0, value: 1 });
    let third_record = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Record { .. }))
        .map(|(i, _)| i)
        .nth(2)
        .unwrap();
    assert!(wait < third_record);
}

#[test]
fn test_submission_waits_on_previous_frame() {
    let mut ctx = context(MockBackend::completing());
    for _ in 0..3 {
        ctx.try_draw_frame().unwrap();
    }

    let submitted = submissions(&ctx.backend().events());
    assert_eq!(submitted[0].wait_previous, None);
    assert_eq!(
        submitted[1].wait_previous,
        Some(PendingSubmission { slot: SlotId::new(0), value: 1 })
    );
    assert_eq!(
        submitted[2].wait_previous,
        Some(PendingSubmission { slot: SlotId::new(1), value: 1 })
    );
    let values: Vec<u64> = submitted.iter().map(|s| s.signal_value).collect();
    assert_eq!(values, vec![1, 1, 2]);
}

#[test]
fn test_presents_the_acquired_image() {
    let mut ctx = context(MockBackend::completing());
    for _ in 0..4 {
        ctx.try_draw_frame().unwrap();
    }
    let events = ctx.backend().events();
    let acquired: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Acquire { image, .. } => Some(*image),
            _ => None,
        })
        .collect();
    let presented: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Present { image, .. } => Some(*image),
            _ => None,
        })
        .collect();
    assert_eq!(acquired, vec![0, 1, 2, 0]);
    assert_eq!(acquired, presented);
    let submitted: Vec<u32> = submissions(&events).iter().map(|s| s.image_index).collect();
    assert_eq!(submitted, acquired);
}

#[test]
fn test_empty_scene_frames_complete() {
    let mut ctx = context(MockBackend::completing());
    for _ in 0..3 {
        let report = ctx.try_draw_frame().unwrap();
        assert!(!report.passes.contains(PassSet::CULL_OBJECTS));
        assert!(report.passes.contains(PassSet::SHADING));
    }

    for commands in recorded(&ctx.backend().events()) {
        assert!(!commands.contains(&Command::Dispatch { pass: Pass::CullObjects, workgroups: [0, 1, 1] }));
        assert!(commands.contains(&Command::BindIndex(Region::new(0, 0))));
        for command in &commands {
            if let Command::Draw { max_draws, .. } = command {
                assert_eq!(*max_draws, 0);
            }
        }
    }
}

#[test]
fn test_scene_counts_reach_push_constants_and_index_binding() {
    let mut ctx = context(MockBackend::completing());
    let (geometry, objects, meshlets) = triangle_scene();
    let index_region = geometry.index_region();
    ctx.try_set_scene(geometry, objects, meshlets).unwrap();
    ctx.try_add_light([1.0, 2.0, 3.0], [1.0, 1.0, 1.0]).unwrap();
    let report = ctx.try_draw_frame().unwrap();
    assert_eq!(report.passes, PassSet::all());

    let geometry_offset = ctx.layout().region(RegionKind::Geometry).offset;
    let commands = recorded(&ctx.backend().events()).pop().unwrap();
    let Some(Command::BindScene(push)) = commands.iter().find(|c| matches!(c, Command::BindScene(_))) else {
        panic!("scene not bound");
    };
    assert_eq!(push.counts, [1, 2, 1, 8]);
    assert!(commands.contains(&Command::BindIndex(Region::new(
        geometry_offset + index_region.offset,
        index_region.size
    ))));
}

#[test]
fn test_lights_grow_and_read_back_in_order() {
    let config = RendererConfig { initial_light_capacity: 2, ..RendererConfig::default() };
    let mut ctx = context_with(MockBackend::completing(), config);
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();

    let positions = [[0.0, 1.0, 0.0], [2.0, 1.0, 0.0], [4.0, 1.0, 0.0]];
    for (i, at) in positions.into_iter().enumerate() {
        assert_eq!(ctx.try_add_light(at, [1.0, 0.5, 0.25]).unwrap(), i);
    }
    let added: Vec<LightRecord> = positions
        .into_iter()
        .map(|at| LightRecord::new(at, [1.0, 0.5, 0.25]))
        .collect();
    assert_eq!(ctx.lights(), added.as_slice());
    assert_eq!(ctx.light_capacity(), 4);

    ctx.backend().clear_events();
    ctx.try_draw_frame().unwrap();

    let events = ctx.backend().events();
    let uploads: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Upload { layout, in_flight } => Some((*layout, *in_flight)),
            _ => None,
        })
        .collect();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0.counts().light_capacity, 4);
    assert_eq!(uploads[0].1, [1, 1]);
    assert!(!events.iter().any(|e| matches!(e, Event::WriteLights { .. })));

    assert_eq!(&ctx.backend().light_region()[..3], added.as_slice());
    assert_eq!(ctx.backend().light_region()[3], LightRecord::default());
    assert_eq!(ctx.backend().retired_count(), 0);
}

#[test]
fn test_in_place_lights_do_not_wait_for_frames_in_flight() {
    let mut ctx = context(MockBackend::default());
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();

    ctx.try_add_light([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
    ctx.try_add_light([0.0, 2.0, 0.0], [0.0, 1.0, 0.0]).unwrap();
    ctx.backend().clear_events();
    let report = ctx.try_draw_frame().unwrap();

    let events = ctx.backend().events();
    let write = position(&events, |e| matches!(e, Event::WriteLights { .. }));
    assert_eq!(events[write], Event::WriteLights { first: 0, count: 2 });
    assert!(!events[..write].iter().any(|e| matches!(e, Event::WaitForValue { .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::Upload { .. })));

    // Only the slot being reused is waited for; slot 1 keeps running
    let waits: Vec<&Event> = events.iter().filter(|e| matches!(e, Event::WaitForValue { .. })).collect();
    assert_eq!(waits, vec![&Event::WaitForValue { slot: 0, value: 1 }]);
    assert_eq!(report.wait, WaitOutcome::Waited { value: 1 });

    assert_eq!(&ctx.backend().light_region()[..2], ctx.lights());
}

#[test]
fn test_new_light_written_while_older_lights_are_read() {
    let mut ctx = context(MockBackend::default());
    ctx.try_add_light([0.0; 3], [1.0; 3]).unwrap();
    ctx.try_draw_frame().unwrap();

    // Frame 0 still reads light 0 on slot 0
    ctx.try_add_light([1.0; 3], [0.5; 3]).unwrap();
    ctx.backend().clear_events();
    let report = ctx.try_draw_frame().unwrap();

    assert_eq!(report.slot, SlotId::new(1));
    let events = ctx.backend().events();
    assert!(events.contains(&Event::WriteLights { first: 1, count: 1 }));
    assert!(!events.iter().any(|e| matches!(e, Event::WaitForValue { .. })));
    assert_eq!(&ctx.backend().light_region()[..2], ctx.lights());
}

#[test]
fn test_light_after_write_only_touches_new_slot() {
    let mut ctx = context(MockBackend::completing());
    ctx.try_add_light([0.0; 3], [1.0; 3]).unwrap();
    ctx.try_draw_frame().unwrap();
    ctx.try_add_light([1.0; 3], [1.0; 3]).unwrap();
    ctx.backend().clear_events();
    ctx.try_draw_frame().unwrap();

    let writes: Vec<Event> = ctx
        .backend()
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::WriteLights { .. }))
        .collect();
    assert_eq!(writes, vec![Event::WriteLights { first: 1, count: 1 }]);
}

#[test]
fn test_replaced_scene_buffer_waits_for_its_frames() {
    let mut ctx = context(MockBackend::default());
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();

    let (geometry, objects, meshlets) = triangle_scene();
    ctx.try_set_scene(geometry, objects, meshlets).unwrap();
    assert_eq!(ctx.backend().retired_count(), 1);
    assert_eq!(ctx.layout().counts().objects, 1);

    // Slot 0 completes while waiting for reuse; slot 1 is still running
    ctx.try_draw_frame().unwrap();
    assert_eq!(ctx.backend().retired_count(), 1);

    ctx.backend().complete_all();
    ctx.try_draw_frame().unwrap();
    assert_eq!(ctx.backend().retired_count(), 0);
}

#[test]
fn test_back_to_back_scene_changes_chain_descriptor_pools() {
    let mut ctx = context(MockBackend::default());
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();
    ctx.backend().clear_events();

    for _ in 0..12 {
        let (geometry, objects, meshlets) = triangle_scene();
        ctx.try_set_scene(geometry, objects, meshlets).unwrap();
    }

    // Nothing completed, so every replaced buffer is still parked
    assert_eq!(ctx.backend().retired_count(), 12);
    assert_eq!(ctx.backend().descriptor_pools(), 2);
    assert!(!ctx
        .backend()
        .events()
        .iter()
        .any(|e| matches!(e, Event::WaitForValue { .. })));

    ctx.backend().complete_all();
    ctx.try_draw_frame().unwrap();
    assert_eq!(ctx.backend().retired_count(), 0);
}

#[test]
fn test_drop_waits_for_frames_in_flight_then_idles() {
    let mut ctx = context(MockBackend::default());
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();
    let log = ctx.backend().event_log();
    ctx.backend().clear_events();

    drop(ctx);
    assert_eq!(
        *log.borrow(),
        vec![
            Event::WaitForValue { slot: 0, value: 1 },
            Event::WaitForValue { slot: 1, value: 1 },
            Event::WaitIdle,
        ]
    );
}

#[test]
fn test_shutdown_waits_then_idles() {
    let mut ctx = context(MockBackend::default());
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();
    let (geometry, objects, meshlets) = triangle_scene();
    ctx.try_set_scene(geometry, objects, meshlets).unwrap();
    ctx.backend().clear_events();

    ctx.try_shutdown().unwrap();
    assert_eq!(
        ctx.backend().events(),
        vec![
            Event::WaitForValue { slot: 0, value: 1 },
            Event::WaitForValue { slot: 1, value: 1 },
            Event::WaitIdle,
        ]
    );
    assert_eq!(ctx.backend().retired_count(), 0);

    ctx.backend().clear_events();
    ctx.try_shutdown().unwrap();
    assert!(ctx.backend().events().is_empty());
    assert!(matches!(ctx.try_draw_frame(), Err(VulkanError::InvalidOperation { .. })));
    assert!(ctx.try_add_light([0.0; 3], [1.0; 3]).is_err());
}

#[test]
fn test_slot_wait_timeout_is_an_error() {
    let config = RendererConfig::default().with_timeout_ns(250);
    let mut ctx = context_with(MockBackend::hanging(), config);
    ctx.try_draw_frame().unwrap();
    ctx.try_draw_frame().unwrap();

    let err = ctx.try_draw_frame().unwrap_err();
    assert!(matches!(err, VulkanError::Timeout { timeout_ns: 250, .. }));
    assert_eq!(recorded(&ctx.backend().events()).len(), 2);

    ctx.backend().recover();
}

#[test]
fn test_invalid_meshlet_ranges_are_rejected() {
    let mut ctx = context(MockBackend::completing());
    let before = *ctx.layout();

    let past_end = vec![ObjectRecord::new([0.0; 3], 1.0, 2, 2)];
    let err = ctx.try_set_scene(SceneGeometry::empty(), past_end, 3).unwrap_err();
    assert!(matches!(err, VulkanError::InvalidOperation { .. }));

    let overflow = vec![ObjectRecord::new([0.0; 3], 1.0, u32::MAX, 1)];
    assert!(ctx.try_set_scene(SceneGeometry::empty(), overflow, u32::MAX).is_err());

    assert_eq!(*ctx.layout(), before);
    assert!(ctx.backend().events().is_empty());
}

#[test]
fn test_suboptimal_present_keeps_rendering() {
    let mut ctx = context(MockBackend::completing().suboptimal());
    for _ in 0..3 {
        let report = ctx.try_draw_frame().unwrap();
        assert_eq!(report.present, PresentStatus::Suboptimal);
    }
    assert_eq!(ctx.frame_count(), 3);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = RendererConfig::default().with_window_size(0, 720);
    assert!(matches!(
        RenderContext::with_backend(MockBackend::default(), &config),
        Err(VulkanError::Config(_))
    ));
}
