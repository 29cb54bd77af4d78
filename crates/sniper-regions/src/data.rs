//! Static region tables: the 85 federal subjects grouped by federal
//! district, the alias table and the INN prefix mapping.

/// Federal districts and their member subjects. The union of all members is
/// the canonical set; every region the pipeline stores on a tender is drawn
/// from it.
pub const FEDERAL_DISTRICTS: &[(&str, &str, &[&str])] = &[
    (
        "Центральный",
        "ЦФО",
        &[
            "Белгородская область",
            "Брянская область",
            "Владимирская область",
            "Воронежская область",
            "Ивановская область",
            "Калужская область",
            "Костромская область",
            "Курская область",
            "Липецкая область",
            "Московская область",
            "Орловская область",
            "Рязанская область",
            "Смоленская область",
            "Тамбовская область",
            "Тверская область",
            "Тульская область",
            "Ярославская область",
            "Москва",
        ],
    ),
    (
        "Северо-Западный",
        "СЗФО",
        &[
            "Республика Карелия",
            "Республика Коми",
            "Архангельская область",
            "Вологодская область",
            "Калининградская область",
            "Ленинградская область",
            "Мурманская область",
            "Новгородская область",
            "Псковская область",
            "Ненецкий автономный округ",
            "Санкт-Петербург",
        ],
    ),
    (
        "Южный",
        "ЮФО",
        &[
            "Республика Адыгея",
            "Республика Калмыкия",
            "Республика Крым",
            "Краснодарский край",
            "Астраханская область",
            "Волгоградская область",
            "Ростовская область",
            "Севастополь",
        ],
    ),
    (
        "Северо-Кавказский",
        "СКФО",
        &[
            "Республика Дагестан",
            "Республика Ингушетия",
            "Кабардино-Балкарская Республика",
            "Карачаево-Черкесская Республика",
            "Республика Северная Осетия — Алания",
            "Чеченская Республика",
            "Ставропольский край",
        ],
    ),
    (
        "Приволжский",
        "ПФО",
        &[
            "Республика Башкортостан",
            "Республика Марий Эл",
            "Республика Мордовия",
            "Республика Татарстан",
            "Удмуртская Республика",
            "Чувашская Республика",
            "Пермский край",
            "Кировская область",
            "Нижегородская область",
            "Оренбургская область",
            "Пензенская область",
            "Самарская область",
            "Саратовская область",
            "Ульяновская область",
        ],
    ),
    (
        "Уральский",
        "УФО",
        &[
            "Курганская область",
            "Свердловская область",
            "Тюменская область",
            "Челябинская область",
            "Ханты-Мансийский автономный округ — Югра",
            "Ямало-Ненецкий автономный округ",
        ],
    ),
    (
        "Сибирский",
        "СФО",
        &[
            "Республика Алтай",
            "Республика Тыва",
            "Республика Хакасия",
            "Алтайский край",
            "Красноярский край",
            "Иркутская область",
            "Кемеровская область",
            "Новосибирская область",
            "Омская область",
            "Томская область",
        ],
    ),
    (
        "Дальневосточный",
        "ДФО",
        &[
            "Республика Бурятия",
            "Республика Саха (Якутия)",
            "Забайкальский край",
            "Камчатский край",
            "Приморский край",
            "Хабаровский край",
            "Амурская область",
            "Магаданская область",
            "Сахалинская область",
            "Еврейская автономная область",
            "Чукотский автономный округ",
        ],
    ),
];

/// Informal names, abbreviations, administrative-centre cities and common
/// misspellings. Keys are matched after the same folding the canonical
/// names go through.
pub const ALIASES: &[(&str, &str)] = &[
    // Abbreviations and informal names.
    ("мск", "Москва"),
    ("москва", "Москва"),
    ("подмосковье", "Московская область"),
    ("спб", "Санкт-Петербург"),
    ("питер", "Санкт-Петербург"),
    ("петербург", "Санкт-Петербург"),
    ("с-петербург", "Санкт-Петербург"),
    ("ленобласть", "Ленинградская область"),
    ("хмао", "Ханты-Мансийский автономный округ — Югра"),
    ("югра", "Ханты-Мансийский автономный округ — Югра"),
    ("ханты-мансийский автономный округ", "Ханты-Мансийский автономный округ — Югра"),
    ("янао", "Ямало-Ненецкий автономный округ"),
    ("ямал", "Ямало-Ненецкий автономный округ"),
    ("нао", "Ненецкий автономный округ"),
    ("еао", "Еврейская автономная область"),
    ("кбр", "Кабардино-Балкарская Республика"),
    ("кчр", "Карачаево-Черкесская Республика"),
    ("рсо-алания", "Республика Северная Осетия — Алания"),
    ("северная осетия", "Республика Северная Осетия — Алания"),
    ("осетия", "Республика Северная Осетия — Алания"),
    ("якутия", "Республика Саха (Якутия)"),
    ("саха", "Республика Саха (Якутия)"),
    ("республика саха", "Республика Саха (Якутия)"),
    ("чечня", "Чеченская Республика"),
    ("ингушетия", "Республика Ингушетия"),
    ("дагестан", "Республика Дагестан"),
    ("татарстан", "Республика Татарстан"),
    ("башкортостан", "Республика Башкортостан"),
    ("башкирия", "Республика Башкортостан"),
    ("удмуртия", "Удмуртская Республика"),
    ("чувашия", "Чувашская Республика"),
    ("мордовия", "Республика Мордовия"),
    ("марий эл", "Республика Марий Эл"),
    ("карелия", "Республика Карелия"),
    ("коми", "Республика Коми"),
    ("калмыкия", "Республика Калмыкия"),
    ("адыгея", "Республика Адыгея"),
    ("крым", "Республика Крым"),
    ("бурятия", "Республика Бурятия"),
    ("тыва", "Республика Тыва"),
    ("тува", "Республика Тыва"),
    ("хакасия", "Республика Хакасия"),
    ("горный алтай", "Республика Алтай"),
    ("кузбасс", "Кемеровская область"),
    // Administrative centres that differ from the subject name.
    ("екатеринбург", "Свердловская область"),
    ("нижний новгород", "Нижегородская область"),
    ("казань", "Республика Татарстан"),
    ("уфа", "Республика Башкортостан"),
    ("краснодар", "Краснодарский край"),
    ("новосибирск", "Новосибирская область"),
    ("самара", "Самарская область"),
    ("ростов-на-дону", "Ростовская область"),
    ("ростов", "Ростовская область"),
    ("челябинск", "Челябинская область"),
    ("омск", "Омская область"),
    ("красноярск", "Красноярский край"),
    ("пермь", "Пермский край"),
    ("воронеж", "Воронежская область"),
    ("волгоград", "Волгоградская область"),
    ("саратов", "Саратовская область"),
    ("тюмень", "Тюменская область"),
    ("тольятти", "Самарская область"),
    ("ижевск", "Удмуртская Республика"),
    ("барнаул", "Алтайский край"),
    ("ульяновск", "Ульяновская область"),
    ("иркутск", "Иркутская область"),
    ("хабаровск", "Хабаровский край"),
    ("ярославль", "Ярославская область"),
    ("владивосток", "Приморский край"),
    ("махачкала", "Республика Дагестан"),
    ("томск", "Томская область"),
    ("оренбург", "Оренбургская область"),
    ("кемерово", "Кемеровская область"),
    ("новокузнецк", "Кемеровская область"),
    ("рязань", "Рязанская область"),
    ("астрахань", "Астраханская область"),
    ("пенза", "Пензенская область"),
    ("липецк", "Липецкая область"),
    ("киров", "Кировская область"),
    ("чебоксары", "Чувашская Республика"),
    ("тула", "Тульская область"),
    ("калининград", "Калининградская область"),
    ("курск", "Курская область"),
    ("улан-удэ", "Республика Бурятия"),
    ("ставрополь", "Ставропольский край"),
    ("сочи", "Краснодарский край"),
    ("тверь", "Тверская область"),
    ("иваново", "Ивановская область"),
    ("брянск", "Брянская область"),
    ("белгород", "Белгородская область"),
    ("владимир", "Владимирская область"),
    ("архангельск", "Архангельская область"),
    ("чита", "Забайкальский край"),
    ("калуга", "Калужская область"),
    ("смоленск", "Смоленская область"),
    ("волжский", "Волгоградская область"),
    ("курган", "Курганская область"),
    ("орел", "Орловская область"),
    ("вологда", "Вологодская область"),
    ("череповец", "Вологодская область"),
    ("мурманск", "Мурманская область"),
    ("сургут", "Ханты-Мансийский автономный округ — Югра"),
    ("тамбов", "Тамбовская область"),
    ("грозный", "Чеченская Республика"),
    ("якутск", "Республика Саха (Якутия)"),
    ("кострома", "Костромская область"),
    ("петрозаводск", "Республика Карелия"),
    ("новгород", "Новгородская область"),
    ("великий новгород", "Новгородская область"),
    ("псков", "Псковская область"),
    ("сыктывкар", "Республика Коми"),
    ("саранск", "Республика Мордовия"),
    ("южно-сахалинск", "Сахалинская область"),
    ("петропавловск-камчатский", "Камчатский край"),
    ("благовещенск", "Амурская область"),
    ("магадан", "Магаданская область"),
    ("биробиджан", "Еврейская автономная область"),
    ("анадырь", "Чукотский автономный округ"),
    ("симферополь", "Республика Крым"),
    ("нарьян-мар", "Ненецкий автономный округ"),
    ("салехард", "Ямало-Ненецкий автономный округ"),
    ("ханты-мансийск", "Ханты-Мансийский автономный округ — Югра"),
    ("абакан", "Республика Хакасия"),
    ("кызыл", "Республика Тыва"),
    ("горно-алтайск", "Республика Алтай"),
    ("майкоп", "Республика Адыгея"),
    ("элиста", "Республика Калмыкия"),
    ("нальчик", "Кабардино-Балкарская Республика"),
    ("черкесск", "Карачаево-Черкесская Республика"),
    ("владикавказ", "Республика Северная Осетия — Алания"),
    ("магас", "Республика Ингушетия"),
    ("йошкар-ола", "Республика Марий Эл"),
];

/// First two digits of a 10- or 12-digit INN identify the tax region.
pub const INN_PREFIXES: &[(&str, &str)] = &[
    ("01", "Республика Адыгея"),
    ("02", "Республика Башкортостан"),
    ("03", "Республика Бурятия"),
    ("04", "Республика Алтай"),
    ("05", "Республика Дагестан"),
    ("06", "Республика Ингушетия"),
    ("07", "Кабардино-Балкарская Республика"),
    ("08", "Республика Калмыкия"),
    ("09", "Карачаево-Черкесская Республика"),
    ("10", "Республика Карелия"),
    ("11", "Республика Коми"),
    ("12", "Республика Марий Эл"),
    ("13", "Республика Мордовия"),
    ("14", "Республика Саха (Якутия)"),
    ("15", "Республика Северная Осетия — Алания"),
    ("16", "Республика Татарстан"),
    ("17", "Республика Тыва"),
    ("18", "Удмуртская Республика"),
    ("19", "Республика Хакасия"),
    ("20", "Чеченская Республика"),
    ("21", "Чувашская Республика"),
    ("22", "Алтайский край"),
    ("23", "Краснодарский край"),
    ("24", "Красноярский край"),
    ("25", "Приморский край"),
    ("26", "Ставропольский край"),
    ("27", "Хабаровский край"),
    ("28", "Амурская область"),
    ("29", "Архангельская область"),
    ("30", "Астраханская область"),
    ("31", "Белгородская область"),
    ("32", "Брянская область"),
    ("33", "Владимирская область"),
    ("34", "Волгоградская область"),
    ("35", "Вологодская область"),
    ("36", "Воронежская область"),
    ("37", "Ивановская область"),
    ("38", "Иркутская область"),
    ("39", "Калининградская область"),
    ("40", "Калужская область"),
    ("41", "Камчатский край"),
    ("42", "Кемеровская область"),
    ("43", "Кировская область"),
    ("44", "Костромская область"),
    ("45", "Курганская область"),
    ("46", "Курская область"),
    ("47", "Ленинградская область"),
    ("48", "Липецкая область"),
    ("49", "Магаданская область"),
    ("50", "Московская область"),
    ("51", "Мурманская область"),
    ("52", "Нижегородская область"),
    ("53", "Новгородская область"),
    ("54", "Новосибирская область"),
    ("55", "Омская область"),
    ("56", "Оренбургская область"),
    ("57", "Орловская область"),
    ("58", "Пензенская область"),
    ("59", "Пермский край"),
    ("60", "Псковская область"),
    ("61", "Ростовская область"),
    ("62", "Рязанская область"),
    ("63", "Самарская область"),
    ("64", "Саратовская область"),
    ("65", "Сахалинская область"),
    ("66", "Свердловская область"),
    ("67", "Смоленская область"),
    ("68", "Тамбовская область"),
    ("69", "Тверская область"),
    ("70", "Томская область"),
    ("71", "Тульская область"),
    ("72", "Тюменская область"),
    ("73", "Ульяновская область"),
    ("74", "Челябинская область"),
    ("75", "Забайкальский край"),
    ("76", "Ярославская область"),
    ("77", "Москва"),
    ("78", "Санкт-Петербург"),
    ("79", "Еврейская автономная область"),
    ("82", "Республика Крым"),
    ("83", "Ненецкий автономный округ"),
    ("86", "Ханты-Мансийский автономный округ — Югра"),
    ("87", "Чукотский автономный округ"),
    ("89", "Ямало-Ненецкий автономный округ"),
    ("91", "Республика Крым"),
    ("92", "Севастополь"),
];
