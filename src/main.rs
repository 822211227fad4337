mod cyclotron;
mod style;

use futures::prelude::*;
use rand::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use iced::button::{self, Button};
use iced::canvas::event::{self, Event};
use iced::canvas::{Cache, Canvas, Cursor, Frame, Geometry, Path, Stroke};
use iced::slider::{self, Slider};
use iced::time;
use iced::{
    mouse, Align, Application, Clipboard, Color, Column, Command, Container, Element,
    HorizontalAlignment, Length, Point, Rectangle, Row, Settings, Subscription,
    VerticalAlignment,
};

use crate::cyclotron::*;

/// Particles added per press of the Scatter button.
const SCATTER_COUNT: usize = 8;

#[derive(Clone, Debug)]
enum Message {
    Tick,
    TogglePlay,
    Scatter,
    Reset,
    Spawned(Point),
    FieldChanged(f32),
    TickAmountChanged(i32),
    Ticked { frames: usize, duration: Duration },
    Scattered { duration: Duration },
    InputsLoaded(Inputs),
}

#[derive(Default)]
struct Controls {
    play_button: button::State,
    next_button: button::State,
    scatter_button: button::State,
    reset_button: button::State,
    field_slider: slider::State,
    tick_amount_slider: slider::State,
}

#[derive(Default)]
struct Accelerator {
    state: State,
    controls: Controls,
}

impl Accelerator {
    fn tick(&mut self) -> Option<impl Future<Output = Message>> {
        if self.state.is_ticking {
            return None;
        }

        self.state.is_ticking = true;

        let frames = self.state.tick_amount as usize;
        let frame = self.state.frame;
        let engine = self.state.engine.clone();

        Some(async move {
            let start = Instant::now();
            let engine = &mut *engine.lock().unwrap();

            for k in 0..frames {
                engine.advance_frame(frame + k);
            }

            let duration = start.elapsed();

            Message::Ticked { frames, duration }
        })
    }

    fn scatter(&mut self) -> Option<impl Future<Output = Message>> {
        let engine = self.state.engine.clone();

        Some(async move {
            let start = Instant::now();
            let engine = &mut *engine.lock().unwrap();
            let extent = engine.physics().view_extent();

            for _ in 0..SCATTER_COUNT {
                let x = (random::<f64>() * 2.0 - 1.0) * extent;
                let y = (random::<f64>() * 2.0 - 1.0) * extent;
                engine.spawn(x, y);
            }

            let duration = start.elapsed();

            Message::Scattered { duration }
        })
    }

    /// Rebuild the engine from the current inputs. A degenerate
    /// configuration keeps the running engine and surfaces the error
    /// in the canvas overlay.
    fn rebuild_engine(&mut self) {
        match Engine::new(&self.state.inputs) {
            Ok(engine) => {
                *self.state.engine.lock().unwrap() = engine;
                self.state.frame = 0;
                self.state.last_error = None;
            }
            Err(error) => {
                self.state.last_error = Some(error);
            }
        }
        self.state.cache.clear();
    }
}

impl Application for Accelerator {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Flags = ();

    fn new(_flags: Self::Flags) -> (Self, Command<Message>) {
        (
            Self { ..Self::default() },
            Command::perform(
                tokio::fs::read_to_string("parameters.json"),
                |result| match result {
                    Ok(inputs) => match serde_json::from_str::<Inputs>(&inputs) {
                        Ok(inputs) => Message::InputsLoaded(inputs),
                        Err(_) => Message::InputsLoaded(Inputs::default()),
                    },
                    Err(_) => Message::InputsLoaded(Inputs::default()),
                },
            ),
        )
    }

    fn title(&self) -> String {
        String::from("Particle Accelerator Simulation")
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.state.is_playing {
            time::every(Duration::from_millis(20)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn update(&mut self, message: Self::Message, _clipboard: &mut Clipboard) -> Command<Message> {
        match message {
            Message::TogglePlay => {
                self.state.is_playing = !self.state.is_playing;
            }
            Message::Tick => {
                if let Some(task) = self.tick() {
                    return Command::perform(task, |message| message);
                }
            }
            Message::Scatter => {
                if let Some(task) = self.scatter() {
                    return Command::perform(task, |message| message);
                }
            }
            Message::Reset => {
                self.rebuild_engine();
            }
            Message::Spawned(position) => {
                let spawned = self
                    .state
                    .engine
                    .lock()
                    .unwrap()
                    .spawn(position.x as f64, position.y as f64);

                if spawned {
                    // a fresh particle restarts the animation if it was paused
                    self.state.is_playing = true;
                    self.state.cache.clear();
                }
            }
            Message::FieldChanged(b_field) => {
                self.state.inputs.b_field = b_field as f64;
            }
            Message::TickAmountChanged(tick_amount) => {
                self.state.tick_amount = tick_amount;
            }
            Message::Ticked { frames, duration } => {
                self.state.is_ticking = false;
                self.state.frame += frames;
                self.state.last_tick_duration = duration;
                self.state.cache.clear();
            }
            Message::Scattered { duration } => {
                self.state.is_playing = true;
                self.state.last_tick_duration = duration;
                self.state.cache.clear();
            }
            Message::InputsLoaded(inputs) => {
                self.state.inputs = inputs;
                self.rebuild_engine();
            }
        }
        Command::none()
    }

    fn view(&mut self) -> Element<Message> {
        let playback_controls = Row::new()
            .spacing(10)
            .push(
                Button::new(
                    &mut self.controls.play_button,
                    iced::widget::Text::new(if self.state.is_playing {
                        "Stop"
                    } else {
                        "Play"
                    }),
                )
                .on_press(Message::TogglePlay)
                .style(style::Button),
            )
            .push(
                Button::new(
                    &mut self.controls.next_button,
                    iced::widget::Text::new("Next"),
                )
                .on_press(Message::Tick)
                .style(style::Button),
            )
            .push(
                Button::new(
                    &mut self.controls.scatter_button,
                    iced::widget::Text::new("Scatter"),
                )
                .on_press(Message::Scatter)
                .style(style::Button),
            )
            .push(
                Button::new(
                    &mut self.controls.reset_button,
                    iced::widget::Text::new("Reset"),
                )
                .on_press(Message::Reset)
                .style(style::Button),
            );

        let field_controls = Row::new()
            .spacing(10)
            .push(
                Slider::new(
                    &mut self.controls.field_slider,
                    0.1..=5.0,
                    self.state.inputs.b_field as f32,
                    |b_field| Message::FieldChanged(b_field),
                )
                .step(0.1)
                .width(Length::Units(200))
                .style(style::Slider),
            )
            .push(
                iced::widget::Text::new(format!("B = {:.1} T", self.state.inputs.b_field))
                    .size(16),
            )
            .align_items(Align::Center);

        let tick_amount_controls = Row::new()
            .spacing(10)
            .push(
                Slider::new(
                    &mut self.controls.tick_amount_slider,
                    1..=50,
                    self.state.tick_amount,
                    |tick_amount| Message::TickAmountChanged(tick_amount),
                )
                .step(1)
                .width(Length::Units(200))
                .style(style::Slider),
            )
            .push(iced::widget::Text::new(format!("Speed = {}", self.state.tick_amount)).size(16))
            .align_items(Align::Center);

        let controls = Row::new()
            .spacing(20)
            .push(playback_controls)
            .push(field_controls)
            .push(tick_amount_controls);

        let content = Column::new()
            .spacing(10)
            .padding(10)
            .align_items(Align::Center)
            .push(
                Canvas::new(&mut self.state)
                    .width(Length::Fill)
                    .height(Length::Fill),
            )
            .push(controls);

        Container::new(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(style::Container)
            .into()
    }
}

struct State {
    engine: Arc<Mutex<Engine>>,
    inputs: Inputs,
    is_playing: bool,
    is_ticking: bool,
    tick_amount: i32,
    frame: usize,
    last_tick_duration: Duration,
    last_error: Option<DomainError>,
    cache: Cache,
}

impl Default for State {
    fn default() -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::default())),
            inputs: Inputs::default(),
            is_playing: false,
            is_ticking: false,
            tick_amount: 1,
            frame: 0,
            last_tick_duration: Duration::default(),
            last_error: None,
            cache: Cache::default(),
        }
    }
}

impl State {
    /// The plotted region is the largest centered square inside the
    /// canvas, spanning [-1.2r, 1.2r] on both axes with +y up.
    fn plot_square(&self, bounds: &Rectangle) -> (f32, f32, f32) {
        let side = bounds.width.min(bounds.height);
        let origin_x = (bounds.width - side) * 0.5;
        let origin_y = (bounds.height - side) * 0.5;
        (origin_x, origin_y, side)
    }
}

impl<'a> iced::canvas::Program<Message> for State {
    fn update(
        &mut self,
        event: Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (event::Status, Option<Message>) {
        match event {
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = match cursor.position_in(&bounds) {
                    Some(position) => position,
                    None => return (event::Status::Ignored, None),
                };

                let (origin_x, origin_y, side) = self.plot_square(&bounds);
                let u = (position.x - origin_x) / side;
                let v = (position.y - origin_y) / side;

                // clicks in the letterbox around the plot carry no data coordinates
                if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
                    return (event::Status::Ignored, None);
                }

                let extent = self.engine.lock().unwrap().physics().view_extent() as f32;
                let x = (u * 2.0 - 1.0) * extent;
                let y = (1.0 - v * 2.0) * extent;

                (
                    event::Status::Captured,
                    Some(Message::Spawned(Point::new(x, y))),
                )
            }
            _ => (event::Status::Ignored, None),
        }
    }

    fn draw(&self, bounds: Rectangle, _cursor: Cursor) -> Vec<Geometry> {
        let (extent, orbit_fraction, particles) = {
            let engine = self.engine.lock().unwrap();
            let physics = engine.physics();
            (
                physics.view_extent() as f32,
                (physics.radius / physics.view_extent()) as f32,
                engine.particles().to_vec(),
            )
        };

        let (origin_x, origin_y, side) = self.plot_square(&bounds);
        let project = move |x: f64, y: f64| {
            Point::new(
                origin_x + (x as f32 / extent + 1.0) * 0.5 * side,
                origin_y + (1.0 - y as f32 / extent) * 0.5 * side,
            )
        };

        let start = Instant::now();

        let trajectory_geometry = self.cache.draw(bounds.size(), |frame| {
            let background = Path::rectangle(Point::ORIGIN, frame.size());
            frame.fill(&background, Color::WHITE);

            let guide = Path::circle(project(0.0, 0.0), orbit_fraction * 0.5 * side);
            frame.stroke(
                &guide,
                Stroke {
                    width: 1.0,
                    color: Color::from_rgba(0.0, 0.0, 0.0, 0.2),
                    ..Stroke::default()
                },
            );

            for (index, particle) in particles.iter().enumerate() {
                let color = if index == 0 {
                    // the reference particle
                    Color::from_rgb(0.9, 0.1, 0.1)
                } else {
                    Color::from_rgb(0.1, 0.2, 0.9)
                };
                let dot = Path::circle(project(particle.x, particle.y), 6.0);
                frame.fill(&dot, color);
            }
        });

        let duration = start.elapsed();

        let overlay = {
            let mut frame = Frame::new(bounds.size());

            let text = iced::canvas::Text {
                color: Color::BLACK,
                size: 14.0,
                position: Point::new(frame.width(), frame.height()),
                horizontal_alignment: HorizontalAlignment::Right,
                vertical_alignment: VerticalAlignment::Bottom,
                ..Default::default()
            };

            let mut content = format! {
                "frame = {}\nlast_tick_duration = {:?}\nDraw duration: {:?}\nParticle count: {}",
                self.frame,
                self.last_tick_duration,
                duration,
                particles.len(),
            };

            if let Some(error) = &self.last_error {
                content = format!("{}\nConfig error: {}", content, error);
            }

            frame.fill_text(iced::canvas::Text { content, ..text });

            frame.into_geometry()
        };

        vec![trajectory_geometry, overlay]
    }

    fn mouse_interaction(&self, bounds: Rectangle, cursor: Cursor) -> mouse::Interaction {
        if cursor.is_over(&bounds) {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }
}

fn main() -> iced::Result {
    Accelerator::run(Settings {
        antialiasing: true,
        ..Settings::default()
    })
}
