use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tactus::timing::GenericLoop;
use tactus::{
    AnimationKind, BeatEvent, Bounds, Canvas, EnsembleConfig, Metronome, MetronomeAnimator,
    Rhythm, Shape, VirtualSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME: f64 = 1.0 / 60.0;
const DEFAULT_SECONDS: f64 = 8.0;

/// One character per animation region.
#[derive(Default)]
struct TextCanvas {
    cells: Vec<char>,
}

impl TextCanvas {
    fn take_row(&mut self) -> String {
        self.cells.drain(..).collect()
    }
}

impl Canvas for TextCanvas {
    fn clear(&mut self, _region: Bounds) {
        self.cells.push(' ');
    }

    fn draw(&mut self, shape: Shape) {
        let Some(cell) = self.cells.last_mut() else {
            return;
        };
        match shape {
            Shape::Circle { alpha, .. } if alpha > 0.66 => *cell = 'O',
            Shape::Circle { alpha, .. } if alpha > 0.0 => *cell = 'o',
            Shape::Line { x1, x2, .. } if x1 == x2 => *cell = '|',
            _ => {}
        }
    }
}

/// The two-voice loop the library has always shipped as its demo.
fn demo(sink: Arc<VirtualSink>) -> Result<Metronome, Box<dyn std::error::Error>> {
    let mut metronome = Metronome::new(sink);
    for source in [
        "sounds/click1.wav",
        "sounds/click2.wav",
        "sounds/click3.wav",
        "sounds/accent1.wav",
    ] {
        metronome.add_sample(source, None);
    }

    let mut events = vec![BeatEvent::new(0.0, "click2")];
    events.extend((0..3).map(|i| BeatEvent::new(1.0 + f64::from(i) / 3.0, "click2")));
    events.push(BeatEvent::new(2.0, "click1"));

    let mut first = Rhythm::new(events)?;
    let mut second = first.clone();
    first.squish(4.0 / 3.0);
    second.apply(|event| {
        let renamed = match event.sound.as_str() {
            "click1" => Some("click3"),
            "click2" => Some("accent1"),
            _ => None,
        };
        if let Some(sound) = renamed {
            event.sound = sound.into();
        }
    });

    metronome.add_beat(GenericLoop::new(&first, true)?.into(), Some("beat1"))?;
    metronome.add_beat(GenericLoop::new(&second, true)?.into(), Some("beat2"))?;
    Ok(metronome)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().map(PathBuf::from);
    let seconds = match args.next() {
        Some(value) => value.parse::<f64>()?,
        None => DEFAULT_SECONDS,
    };

    let sink = Arc::new(VirtualSink::new());
    let mut metronome = match &path {
        Some(path) => EnsembleConfig::load(path)?.build(sink.clone())?,
        None => demo(sink.clone())?,
    };

    let mut animator = MetronomeAnimator::new();
    let ids: Vec<String> = metronome.player_ids().map(str::to_string).collect();
    for (index, id) in ids.iter().enumerate() {
        animator.setup_animation(&metronome, id, AnimationKind::Simple)?;
        let left = index as f32 * 512.0;
        animator.configure_animation(id, Bounds::new(left, 0.0, left + 512.0, 512.0))?;
    }

    info!(players = ids.len(), seconds, "running ensemble");
    metronome.start_all(0.0)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut canvas = TextCanvas::default();
    let mut frame = 0u64;
    while sink.now() < seconds {
        sink.advance_by(FRAME);
        metronome.tick()?;
        animator.animate(sink.now(), &mut canvas);
        for trigger in sink.take_triggers() {
            *counts.entry(trigger.sound).or_default() += 1;
        }

        let row = canvas.take_row();
        if frame % 6 == 0 {
            println!("{:7.3}s [{row}]", sink.now());
        }
        frame += 1;
    }
    metronome.stop_all();

    for (sound, count) in &counts {
        println!("{sound:>10}: {count} triggers");
    }
    for id in &ids {
        let player = metronome.player(id)?;
        println!("{id:>10}: {} allocation passes", player.passes());
    }
    Ok(())
}
