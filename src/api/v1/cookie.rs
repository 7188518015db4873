/// Renders and reads the http-only cookie that carries the refresh token.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl RefreshCookie {
    pub fn set(&self, token: &str) -> String {
        self.render(token, self.max_age_secs)
    }

    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Strict",
            self.name, value, self.path, max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Value of this cookie in a `Cookie` request header, if present and non-empty.
    pub fn read<'a>(&self, header: &'a str) -> Option<&'a str> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}
