use anyhow::{Result, anyhow};
use log::{info, warn};

/// One physical key press, with shift held when `shift` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub key: StrokeKey,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKey {
    /// Lowercase letter, digit or unshifted punctuation on a US layout.
    Char(char),
    Space,
    Backspace,
    Enter,
}

/// Map a keyboard label to the keystroke that types it.
pub fn keystroke(label: &str) -> Option<Keystroke> {
    let plain = |key| Keystroke { key, shift: false };
    let shifted = |c| Keystroke {
        key: StrokeKey::Char(c),
        shift: true,
    };
    match label {
        "SPACE" => return Some(plain(StrokeKey::Space)),
        "BACKSPACE" => return Some(plain(StrokeKey::Backspace)),
        "ENTER" => return Some(plain(StrokeKey::Enter)),
        _ => {}
    }
    let mut chars = label.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let stroke = match c {
        'A'..='Z' => plain(StrokeKey::Char(c.to_ascii_lowercase())),
        'a'..='z' | '0'..='9' => plain(StrokeKey::Char(c)),
        '-' | '=' | '[' | ']' | ';' | '\'' | ',' | '.' | '/' => plain(StrokeKey::Char(c)),
        '!' => shifted('1'),
        '@' => shifted('2'),
        '#' => shifted('3'),
        '$' => shifted('4'),
        '%' => shifted('5'),
        '^' => shifted('6'),
        '&' => shifted('7'),
        '*' => shifted('8'),
        '(' => shifted('9'),
        ')' => shifted('0'),
        _ => return None,
    };
    Some(stroke)
}

pub struct UinputSink {
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    pub fn is_virtual(&self) -> bool {
        self.linux.is_some()
    }

    /// Type the key a keyboard label stands for.
    pub fn type_key(&mut self, label: &str) -> Result<()> {
        let stroke = keystroke(label).ok_or_else(|| anyhow!("no keystroke for key '{label}'"))?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.stroke(stroke)?;
        }
        Ok(())
    }

    pub fn click_left(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click_left()?;
        }
        Ok(())
    }

    pub fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.move_relative(dx, dy)?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn map_key(key: StrokeKey) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match key {
        StrokeKey::Space => K::Space,
        StrokeKey::Backspace => K::BackSpace,
        StrokeKey::Enter => K::Enter,
        StrokeKey::Char(c) => match c {
            'a' => K::A,
            'b' => K::B,
            'c' => K::C,
            'd' => K::D,
            'e' => K::E,
            'f' => K::F,
            'g' => K::G,
            'h' => K::H,
            'i' => K::I,
            'j' => K::J,
            'k' => K::K,
            'l' => K::L,
            'm' => K::M,
            'n' => K::N,
            'o' => K::O,
            'p' => K::P,
            'q' => K::Q,
            'r' => K::R,
            's' => K::S,
            't' => K::T,
            'u' => K::U,
            'v' => K::V,
            'w' => K::W,
            'x' => K::X,
            'y' => K::Y,
            'z' => K::Z,
            '1' => K::_1,
            '2' => K::_2,
            '3' => K::_3,
            '4' => K::_4,
            '5' => K::_5,
            '6' => K::_6,
            '7' => K::_7,
            '8' => K::_8,
            '9' => K::_9,
            '0' => K::_0,
            '-' => K::Minus,
            '=' => K::Equal,
            '[' => K::LeftBrace,
            ']' => K::RightBrace,
            ';' => K::SemiColon,
            '\'' => K::Apostrophe,
            ',' => K::Comma,
            '.' => K::Dot,
            '/' => K::Slash,
            other => return Err(anyhow!("unsupported key: {other}")),
        },
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{Keyboard, controller::Mouse, relative};

        let dev = uinput::default()?
            .name("Airkeys Virtual Input")?
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(Mouse::Left)?
            .event(Keyboard::All)?
            .create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn stroke(&mut self, stroke: Keystroke) -> Result<()> {
        use uinput::event::keyboard::Key as K;
        let key = map_key(stroke.key)?;
        if stroke.shift {
            self.key_send(K::LeftShift, 1)?;
        }
        self.key_send(key, 1)?;
        self.sync()?;
        self.key_send(key, 0)?;
        if stroke.shift {
            self.key_send(K::LeftShift, 0)?;
        }
        self.sync()
    }

    fn click_left(&mut self) -> Result<()> {
        use uinput::event::controller::Mouse;
        self.dev.send(Mouse::Left, 1)?;
        self.sync()?;
        self.dev.send(Mouse::Left, 0)?;
        self.sync()
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        use uinput::event::relative::Position;
        self.dev.send(Position::X, dx)?;
        self.dev.send(Position::Y, dy)?;
        self.sync()
    }
}
