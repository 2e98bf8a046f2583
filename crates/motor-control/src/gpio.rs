//! Raspberry Pi backend built on rppal

use crate::{DcMotorPins, HBridge, MotorError, PulseCounter, Result, ServoOutput, ServoPins};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SPEED_PWM_FREQUENCY_HZ: f64 = 100.0;
const SERVO_PERIOD: Duration = Duration::from_millis(20);
const SERVO_MIN_PULSE_US: f64 = 1000.0;
const SERVO_MAX_PULSE_US: f64 = 2000.0;

fn io(e: rppal::gpio::Error) -> MotorError {
    MotorError::Io(e.to_string())
}

/// H-bridge driven by two direction pins and a software PWM enable pin
pub struct GpioHBridge {
    forward: OutputPin,
    backward: OutputPin,
    enable: OutputPin,
    active: bool,
}

impl GpioHBridge {
    pub fn open(gpio: &Gpio, pins: &DcMotorPins) -> Result<Self> {
        Ok(Self {
            forward: gpio.get(pins.forward).map_err(io)?.into_output_low(),
            backward: gpio.get(pins.backward).map_err(io)?.into_output_low(),
            enable: gpio.get(pins.speed).map_err(io)?.into_output_low(),
            active: false,
        })
    }

    fn drive(&mut self, forward: bool, speed: f32) -> Result<()> {
        if forward {
            self.backward.set_low();
            self.forward.set_high();
        } else {
            self.forward.set_low();
            self.backward.set_high();
        }
        self.enable
            .set_pwm_frequency(SPEED_PWM_FREQUENCY_HZ, f64::from(speed.clamp(0.0, 1.0)))
            .map_err(io)?;
        self.active = true;
        Ok(())
    }
}

impl HBridge for GpioHBridge {
    fn forward(&mut self, speed: f32) -> Result<()> {
        self.drive(true, speed)
    }

    fn backward(&mut self, speed: f32) -> Result<()> {
        self.drive(false, speed)
    }

    fn stop(&mut self) -> Result<()> {
        self.forward.set_low();
        self.backward.set_low();
        let cleared = self.enable.clear_pwm().map_err(io);
        self.enable.set_low();
        self.active = false;
        cleared
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Quadrature encoder counted by interrupt on both edges of both channels
pub struct GpioEncoder {
    count: Arc<AtomicU64>,
    _channel_a: InputPin,
    _channel_b: InputPin,
}

impl GpioEncoder {
    pub fn open(gpio: &Gpio, pins: &DcMotorPins) -> Result<Self> {
        let count = Arc::new(AtomicU64::new(0));
        let channel_a = Self::watch_pin(gpio, pins.encoder_a, &count)?;
        let channel_b = Self::watch_pin(gpio, pins.encoder_b, &count)?;
        Ok(Self {
            count,
            _channel_a: channel_a,
            _channel_b: channel_b,
        })
    }

    fn watch_pin(gpio: &Gpio, pin: u8, count: &Arc<AtomicU64>) -> Result<InputPin> {
        let mut input = gpio.get(pin).map_err(io)?.into_input_pullup();
        let count = Arc::clone(count);
        input
            .set_async_interrupt(Trigger::Both, move |_: Level| {
                count.fetch_add(1, Ordering::Relaxed);
            })
            .map_err(io)?;
        Ok(input)
    }
}

impl PulseCounter for GpioEncoder {
    fn pulses(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Hobby servo on a software PWM pin (1.0 ms to 2.0 ms pulse every 20 ms)
pub struct GpioServo {
    pin: OutputPin,
}

impl GpioServo {
    pub fn open(gpio: &Gpio, pins: &ServoPins) -> Result<Self> {
        Ok(Self {
            pin: gpio.get(pins.signal).map_err(io)?.into_output_low(),
        })
    }
}

impl ServoOutput for GpioServo {
    fn set_value(&mut self, value: f64) -> Result<()> {
        let mid = (SERVO_MIN_PULSE_US + SERVO_MAX_PULSE_US) / 2.0;
        let half_span = (SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US) / 2.0;
        let pulse_us = mid + value.clamp(-1.0, 1.0) * half_span;
        self.pin
            .set_pwm(SERVO_PERIOD, Duration::from_micros(pulse_us.round() as u64))
            .map_err(io)
    }

    fn detach(&mut self) -> Result<()> {
        let cleared = self.pin.clear_pwm().map_err(io);
        self.pin.set_low();
        cleared
    }
}

/// Open the GPIO peripheral
pub fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(io)
}
